use rand::Rng;

const PREFIX: &str = "TKT";
const SUFFIX_LEN: usize = 9;
const BASE36_UPPER: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Fallback ticket id for bookings that arrive without one.
///
/// Not unique: nothing checks it against earlier tickets.
pub fn generate_ticket_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36_UPPER[rng.gen_range(0..BASE36_UPPER.len())] as char)
        .collect();
    format!("{PREFIX}{suffix}")
}

/// Keeps a client supplied id untouched, generates one otherwise.
pub fn resolve_ticket_id(supplied: Option<&str>) -> String {
    match supplied {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => generate_ticket_id(),
    }
}

pub fn is_generated_ticket_id(id: &str) -> bool {
    id.strip_prefix(PREFIX).is_some_and(|suffix| {
        suffix.len() == SUFFIX_LEN
            && suffix
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
    })
}
