use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};


pub type ErrorStr = &'static str;
pub type Result<T> = std::result::Result<T, ErrorStr>;
pub type ResultV = Result<()>;


const QID_CHARSET: &[u8] = b"0123456789abcdef";

pub fn generate_hex_id(length: u32) -> String {
    let mut rng = rand::thread_rng();

    (0..length).map(
        |_| {
            let idx = rng.gen_range(0..QID_CHARSET.len());
            QID_CHARSET[idx] as char
        }
    ).collect()
}


fn current_duration() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("Time went backwards")
}

pub fn time_us() -> u128 {
    current_duration().as_micros()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_hex_id_length_and_charset() {
        let id = generate_hex_id(16);
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_hex_id_unique() {
        assert_ne!(generate_hex_id(32), generate_hex_id(32));
    }
}
