//! User ids are version-5 (name-based, SHA-1) UUIDs. On the wire they are 16 raw bytes; everywhere
//! else they are handled in their canonical lowercase hyphenated form.

use uuid::{Uuid, Variant};

/// Returns whether `id` has the shape of a user id: version 5 with the RFC 4122 variant, meaning
/// its string form matches `xxxxxxxx-xxxx-5xxx-[89ab]xxx-xxxxxxxxxxxx`.
pub fn is_valid_user_id(id: &Uuid) -> bool {
    id.get_version_num() == 5 && id.get_variant() == Variant::RFC4122
}

/// Parses a configured user id into its canonical form, rejecting anything that isn't a valid
/// user id as per [`is_valid_user_id`].
pub fn parse_user_id(s: &str) -> Option<String> {
    let id = Uuid::parse_str(s.trim()).ok()?;
    is_valid_user_id(&id).then(|| id.hyphenated().to_string())
}

/// Derives the user id for a hostname: the version-5 UUID of the name in the DNS namespace.
pub fn user_id_for_hostname(hostname: &str) -> String {
    let normalized = hostname.trim().to_ascii_lowercase();
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, normalized.as_bytes()).hyphenated().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_gate() {
        let v5: Uuid = "2f3c6b9e-2a8f-5d1e-9c4b-6a7f8e9d0c1b".parse().unwrap();
        let v4: Uuid = "2f3c6b9e-2a8f-4d1e-9c4b-6a7f8e9d0c1b".parse().unwrap();
        let bad_variant: Uuid = "2f3c6b9e-2a8f-5d1e-cc4b-6a7f8e9d0c1b".parse().unwrap();

        assert!(is_valid_user_id(&v5));
        assert!(!is_valid_user_id(&v4));
        assert!(!is_valid_user_id(&bad_variant));
    }

    #[test]
    fn configured_ids_are_canonicalized() {
        assert_eq!(
            parse_user_id(" 2F3C6B9E-2A8F-5D1E-9C4B-6A7F8E9D0C1B "),
            Some("2f3c6b9e-2a8f-5d1e-9c4b-6a7f8e9d0c1b".to_string())
        );
        assert_eq!(parse_user_id("2f3c6b9e-2a8f-4d1e-9c4b-6a7f8e9d0c1b"), None);
        assert_eq!(parse_user_id("not a uuid"), None);
    }

    #[test]
    fn hostname_ids_are_valid_and_stable() {
        let id = user_id_for_hostname("Relay.Example.com");

        assert_eq!(id, user_id_for_hostname("relay.example.com"));
        assert_eq!(parse_user_id(&id), Some(id.clone()));
    }
}
