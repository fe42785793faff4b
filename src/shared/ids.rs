use getrandom::getrandom;

const HEX_ALPHABET: &[u8; 16] = b"0123456789abcdef";

/// Generates a random step id in UUIDv4 format. The service uses step ids as
/// idempotency keys, so they are minted client-side when a step is created.
pub fn generate_step_id() -> Result<String, String> {
    let mut bytes = [0_u8; 16];
    getrandom(&mut bytes).map_err(|err| format!("failed to generate step id: {err}"))?;
    // RFC 4122 version and variant bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let mut out = String::with_capacity(36);
    for (index, byte) in bytes.iter().enumerate() {
        if matches!(index, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        out.push(HEX_ALPHABET[(byte >> 4) as usize] as char);
        out.push(HEX_ALPHABET[(byte & 0x0f) as usize] as char);
    }
    Ok(out)
}
