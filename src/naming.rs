//! Resource naming conventions shared by every stack variant.

use rand::Rng;

/// Secret vault: `{prefix}-kv`.
pub fn vault_name(prefix: &str) -> String {
    format!("{prefix}-kv")
}

/// Primary storage account: `{prefix}storage`.
pub fn primary_storage_name(prefix: &str) -> String {
    format!("{prefix}storage")
}

/// Secondary storage account: `{prefix}storage2`.
pub fn secondary_storage_name(prefix: &str) -> String {
    format!("{prefix}storage2")
}

/// SQL server: `{prefix}-sql`.
pub fn sql_server_name(prefix: &str) -> String {
    format!("{prefix}-sql")
}

/// Consumer web app and its plan: `{prefix}-app`.
pub fn consumer_app_name(prefix: &str) -> String {
    format!("{prefix}-app")
}

/// App-service plan hosting the rotation function.
pub fn rotation_plan_name(resource_group_name: &str) -> String {
    format!("{resource_group_name}-rotation-fnapp-plan")
}

/// Default rotation function app name.
pub fn default_function_app_name(resource_group_name: &str) -> String {
    format!("{resource_group_name}-storagekey-rotation-fnapp")
}

/// Storage account dedicated to the function runtime:
/// `{random-13-char-lowercase-alnum}fnappstrg`.
pub fn function_storage_account_name() -> String {
    format!("{}fnappstrg", random_lowercase_alnum(13))
}

pub fn random_lowercase_alnum(length: usize) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// A random name in UUID form, used for role-assignment names.
pub fn random_uuid() -> String {
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    // RFC 4122 version and variant bits
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        bytes[6], bytes[7],
        bytes[8], bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_names_follow_the_conventions() {
        assert_eq!(vault_name("demo"), "demo-kv");
        assert_eq!(primary_storage_name("demo"), "demostorage");
        assert_eq!(secondary_storage_name("demo"), "demostorage2");
        assert_eq!(rotation_plan_name("demo"), "demo-rotation-fnapp-plan");
        assert_eq!(
            default_function_app_name("demo"),
            "demo-storagekey-rotation-fnapp"
        );
    }

    #[test]
    fn function_storage_name_is_random_lowercase_with_suffix() {
        let name = function_storage_account_name();
        assert_eq!(name.len(), 13 + "fnappstrg".len());
        assert!(name.ends_with("fnappstrg"));
        assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

        let other = function_storage_account_name();
        assert_ne!(name, other);
    }

    #[test]
    fn random_uuid_has_canonical_shape() {
        let id = random_uuid();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(
            parts.iter().map(|p| p.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
    }
}
