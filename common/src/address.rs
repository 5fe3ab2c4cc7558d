//! Chain addresses are kept in one canonical form: lowercase hex with a `0x` prefix.

pub const ADDRESS_PREFIX: &str = "0x";

pub fn ensure_prefixed_address(address: &str) -> String {
    let trimmed = address.trim();
    let bare = trimmed
        .strip_prefix(ADDRESS_PREFIX)
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    format!("{ADDRESS_PREFIX}{}", bare.to_lowercase())
}

pub fn ensure_non_prefixed_address(address: &str) -> String {
    ensure_prefixed_address(address)[ADDRESS_PREFIX.len()..].to_string()
}
