//! Reconciliation summary card, written to stderr so stdout stays the artifact.

use onboard_core::GuidanceEntry;
use onboard_pipeline::ReconcileOutcome;

const MAX_LIST_ITEMS: usize = 10;

pub fn print_summary(outcome: &ReconcileOutcome) {
    eprint!("{}", render_summary(outcome));
}

fn render_summary(outcome: &ReconcileOutcome) -> String {
    let (mapped, unmapped): (Vec<&GuidanceEntry>, Vec<&GuidanceEntry>) =
        outcome.catalog.iter().partition(|g| g.is_mapped());

    let mut out = String::from("=== Reconciliation ===\n");
    out.push_str(&format!("  {:<26} {}\n", "rules", outcome.rules));
    out.push_str(&format!("  {:<26} {}\n", "catalog entries", outcome.catalog.len()));
    out.push_str(&format!("  {:<26} {}\n", "mapped", mapped.len()));
    out.push_str(&format!("  {:<26} {}\n", "unmapped", unmapped.len()));
    out.push_str(&format!("  {:<26} {} bytes\n", "artifact", outcome.artifact.len()));

    if !mapped.is_empty() {
        out.push_str("Mapped\n");
        for g in mapped.iter().take(MAX_LIST_ITEMS) {
            out.push_str(&format!(
                "  {:<26} {} ({})\n",
                g.source_name,
                g.mapping_key.as_deref().unwrap_or_default(),
                g.similarity.as_deref().unwrap_or("-"),
            ));
        }
        push_overflow(&mut out, mapped.len());
    }
    if !unmapped.is_empty() {
        out.push_str("Unmapped\n");
        for g in unmapped.iter().take(MAX_LIST_ITEMS) {
            out.push_str(&format!("  {}\n", g.source_name));
        }
        push_overflow(&mut out, unmapped.len());
    }
    out
}

fn push_overflow(out: &mut String, total: usize) {
    if total > MAX_LIST_ITEMS {
        out.push_str(&format!("  ... and {} more\n", total - MAX_LIST_ITEMS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(name: &str, key: &str) -> GuidanceEntry {
        GuidanceEntry {
            mapping_key: Some(key.into()),
            similarity: Some("0.8800".into()),
            ..GuidanceEntry::candidate(name)
        }
    }

    #[test]
    fn summary_groups_mapped_and_unmapped() {
        let outcome = ReconcileOutcome {
            artifact: b"[]".to_vec(),
            catalog: vec![mapped("Main", "K1"), GuidanceEntry::candidate("Late Fee")],
            rules: 2,
        };
        let text = render_summary(&outcome);
        assert!(text.contains("Main"));
        assert!(text.contains("K1 (0.8800)"));
        assert!(text.contains("Unmapped\n  Late Fee"));
    }

    #[test]
    fn long_lists_are_truncated() {
        let catalog = (0..12)
            .map(|i| GuidanceEntry::candidate(format!("label {i}")))
            .collect();
        let outcome = ReconcileOutcome {
            artifact: Vec::new(),
            catalog,
            rules: 12,
        };
        let text = render_summary(&outcome);
        assert!(text.contains("... and 2 more"));
        assert!(!text.contains("label 11"));
    }
}
