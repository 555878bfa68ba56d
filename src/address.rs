//! EVM address helpers

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
pub const ZERO_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

/// `0x` followed by exactly 40 hex digits. Mixed case is accepted; checksums are not enforced.
pub fn is_valid_address(candidate: &str) -> bool {
    candidate.len() == 42
        && candidate.starts_with("0x")
        && hex::decode(&candidate[2..]).map_or(false, |bytes| bytes.len() == 20)
}

pub fn is_zero_address(candidate: &str) -> bool {
    candidate.eq_ignore_ascii_case(ZERO_ADDRESS)
}

pub fn parse_address(candidate: &str) -> Option<[u8; 20]> {
    if !is_valid_address(candidate) {
        return None;
    }
    let mut out = [0u8; 20];
    hex::decode_to_slice(&candidate[2..], &mut out).ok()?;
    Some(out)
}

/// Genesis `alloc` keys are lowercase and unprefixed.
pub fn alloc_key(address: &[u8; 20]) -> String {
    hex::encode(address)
}

/// Left-pads an address into a 32-byte storage word.
pub fn storage_word(address: &[u8; 20]) -> String {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address);
    format!("0x{}", hex::encode(word))
}

pub fn format_address(address: &[u8; 20]) -> String {
    format!("0x{}", hex::encode(address))
}
