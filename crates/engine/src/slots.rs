//! Slot-based description composition.
//!
//! Slot 0 holds the original activity description; slot `i + 1`
//! belongs to the enricher at index `i` in the pipeline config, and
//! appendix slots (branding) come after all configured enrichers.
//! Composition joins non-empty slots in slot order, which makes the
//! final text independent of execution order: a deferred Phase-2
//! enricher with an earlier configured index still appears earlier.

use std::collections::HashSet;

use fitglue_core::ProviderType;

#[derive(Debug, Clone)]
pub struct DescriptionSlots {
    texts: Vec<String>,
    owners: Vec<Option<ProviderType>>,
}

impl DescriptionSlots {
    /// One slot per configured enricher plus the original-description
    /// slot.
    pub fn new(original: &str, enricher_types: &[ProviderType]) -> Self {
        let mut texts = Vec::with_capacity(enricher_types.len() + 1);
        let mut owners = Vec::with_capacity(enricher_types.len() + 1);
        texts.push(original.trim().to_string());
        owners.push(None);
        for t in enricher_types {
            texts.push(String::new());
            owners.push(Some(*t));
        }
        Self { texts, owners }
    }

    /// Write the slot for the enricher at config index `index`.
    pub fn set_enricher(&mut self, index: usize, text: &str) {
        if let Some(slot) = self.texts.get_mut(index + 1) {
            *slot = text.trim().to_string();
        }
    }

    /// Append a trailing slot after every enricher slot.
    pub fn push_appendix(&mut self, owner: ProviderType, text: &str) {
        self.texts.push(text.trim().to_string());
        self.owners.push(Some(owner));
    }

    /// Join non-empty slots in slot order with blank lines.
    pub fn compose(&self) -> String {
        self.texts
            .iter()
            .filter(|t| !t.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Compose with the slots of excluded provider types zeroed out.
    /// `excluded` holds provider-type strings (e.g. `MUSCLE_HEATMAP`).
    pub fn compose_excluding(&self, excluded: &HashSet<String>) -> String {
        self.texts
            .iter()
            .zip(&self.owners)
            .filter(|(text, owner)| {
                if text.is_empty() {
                    return false;
                }
                match owner {
                    Some(t) => !excluded.contains(t.as_str_name()),
                    None => true,
                }
            })
            .map(|(text, _)| text.clone())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots_with(original: &str) -> DescriptionSlots {
        DescriptionSlots::new(
            original,
            &[ProviderType::Weather, ProviderType::MuscleHeatmap],
        )
    }

    #[test]
    fn composes_in_slot_order() {
        let mut slots = slots_with("Original");
        slots.set_enricher(1, "Heatmap text");
        slots.set_enricher(0, "12C, light rain");
        assert_eq!(
            slots.compose(),
            "Original\n\n12C, light rain\n\nHeatmap text"
        );
    }

    #[test]
    fn empty_slots_are_skipped() {
        let mut slots = slots_with("");
        slots.set_enricher(1, "Heatmap text");
        assert_eq!(slots.compose(), "Heatmap text");
    }

    #[test]
    fn write_order_does_not_matter() {
        // Phase-2 deferred enricher at index 0 writing after index 1
        // still lands first in the composition.
        let mut a = slots_with("O");
        a.set_enricher(0, "first");
        a.set_enricher(1, "second");

        let mut b = slots_with("O");
        b.set_enricher(1, "second");
        b.set_enricher(0, "first");

        assert_eq!(a.compose(), b.compose());
    }

    #[test]
    fn excluding_zeroes_owned_slots_only() {
        let mut slots = slots_with("Original");
        slots.set_enricher(0, "weather line");
        slots.set_enricher(1, "heatmap line");

        let excluded: HashSet<String> = ["MUSCLE_HEATMAP".to_string()].into();
        assert_eq!(
            slots.compose_excluding(&excluded),
            "Original\n\nweather line"
        );
        // Untouched by exclusion of a type that owns no slot.
        let other: HashSet<String> = ["AI_SUMMARY".to_string()].into();
        assert_eq!(slots.compose_excluding(&other), slots.compose());
    }

    #[test]
    fn appendix_comes_last_and_is_excludable() {
        let mut slots = slots_with("Original");
        slots.push_appendix(ProviderType::Branding, "Synced with FitGlue");
        assert_eq!(slots.compose(), "Original\n\nSynced with FitGlue");

        let excluded: HashSet<String> = ["BRANDING".to_string()].into();
        assert_eq!(slots.compose_excluding(&excluded), "Original");
    }

    #[test]
    fn out_of_range_set_is_ignored() {
        let mut slots = slots_with("O");
        slots.set_enricher(9, "nope");
        assert_eq!(slots.compose(), "O");
    }
}
