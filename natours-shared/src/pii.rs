use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps a sensitive value so that `Debug`/`Display` never print it.
///
/// Serialization is transparent: API payloads need the real value, the
/// wrapper only exists to keep it out of `tracing` output.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", mask_email(self.0.as_ref()))
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Keeps the first character of the local part and the whole domain:
/// `jonas@example.com` -> `j****@example.com`.
pub fn mask_email(value: &str) -> String {
    match value.split_once('@') {
        Some((local, domain)) => {
            let mut chars = local.chars();
            match chars.next() {
                Some(first) => format!("{}{}@{}", first, "*".repeat(chars.count()), domain),
                None => format!("@{}", domain),
            }
        }
        None => "*".repeat(value.chars().count()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_email_keeps_domain() {
        assert_eq!(mask_email("jonas@example.com"), "j****@example.com");
        assert_eq!(mask_email("a@b.io"), "a@b.io");
        assert_eq!(mask_email("secret"), "******");
    }

    #[test]
    fn test_masked_debug_hides_value() {
        let masked = Masked("laura@example.com".to_string());
        assert_eq!(format!("{:?}", masked), "********");
        assert_eq!(format!("{}", masked), "l****@example.com");
    }
}
