use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Three-way field state for layered configuration.
///
/// A layer either inherits whatever the layers below it resolved, or sets
/// its own value. Absent and `null` JSON fields both deserialize to
/// [`Overlay::Inherit`], so "not provided" can never be confused with
/// "explicitly blank".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Overlay<T> {
    #[default]
    Inherit,
    Set(T),
}

impl<T> Overlay<T> {
    pub fn is_inherit(&self) -> bool {
        matches!(self, Overlay::Inherit)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Overlay::Set(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Overlay::Set(value) => Some(value),
            Overlay::Inherit => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Overlay::Set(value) => Some(value),
            Overlay::Inherit => None,
        }
    }

    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(value) => Overlay::Set(value),
            None => Overlay::Inherit,
        }
    }

    /// Overwrites `slot` when this overlay carries a value.
    pub fn apply_to(&self, slot: &mut T)
    where
        T: Clone,
    {
        if let Overlay::Set(value) = self {
            *slot = value.clone();
        }
    }
}

impl Overlay<String> {
    /// Collapses blank and whitespace-only values to `Inherit` and trims the
    /// rest. Applied at write boundaries so stored overlays never carry an
    /// "explicit blank".
    pub fn normalized(self) -> Self {
        match self {
            Overlay::Set(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Overlay::Inherit
                } else {
                    Overlay::Set(trimmed.to_string())
                }
            }
            Overlay::Inherit => Overlay::Inherit,
        }
    }
}

impl<T> From<Option<T>> for Overlay<T> {
    fn from(value: Option<T>) -> Self {
        Overlay::from_option(value)
    }
}

impl<T: Serialize> Serialize for Overlay<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Overlay::Inherit => serializer.serialize_none(),
            Overlay::Set(value) => serializer.serialize_some(value),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Overlay<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Overlay::from_option(Option::<T>::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::Overlay;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Carrier {
        #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
        note: Overlay<String>,
        #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
        count: Overlay<u8>,
    }

    #[test]
    fn absent_and_null_both_deserialize_to_inherit() {
        let absent: Carrier = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.note, Overlay::Inherit);
        assert_eq!(absent.count, Overlay::Inherit);

        let null: Carrier = serde_json::from_str(r#"{"note":null,"count":null}"#).unwrap();
        assert_eq!(null.note, Overlay::Inherit);
        assert_eq!(null.count, Overlay::Inherit);
    }

    #[test]
    fn set_values_round_trip() {
        let carrier: Carrier = serde_json::from_str(r#"{"note":"hello","count":3}"#).unwrap();
        assert_eq!(carrier.note, Overlay::Set("hello".to_string()));
        assert_eq!(carrier.count, Overlay::Set(3));

        let encoded = serde_json::to_string(&carrier).unwrap();
        assert_eq!(encoded, r#"{"note":"hello","count":3}"#);
    }

    #[test]
    fn inherit_fields_are_skipped_on_serialize() {
        let encoded = serde_json::to_string(&Carrier::default()).unwrap();
        assert_eq!(encoded, "{}");
    }

    #[test]
    fn normalized_collapses_blank_strings() {
        assert_eq!(Overlay::Set("   ".to_string()).normalized(), Overlay::Inherit);
        assert_eq!(Overlay::Set(String::new()).normalized(), Overlay::Inherit);
        assert_eq!(
            Overlay::Set("  kept  ".to_string()).normalized(),
            Overlay::Set("kept".to_string())
        );
        assert_eq!(Overlay::<String>::Inherit.normalized(), Overlay::Inherit);
    }

    #[test]
    fn apply_to_only_overwrites_when_set() {
        let mut slot = "baseline".to_string();
        Overlay::<String>::Inherit.apply_to(&mut slot);
        assert_eq!(slot, "baseline");

        Overlay::Set("override".to_string()).apply_to(&mut slot);
        assert_eq!(slot, "override");
    }
}
