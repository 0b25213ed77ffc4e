use rand::{thread_rng, Rng};
use rand::distributions::Alphanumeric;


pub const ID_LEN: usize = 16;


/// Allocates a random identifier for an image or a container
///
/// 16 lowercase alphanumerics give about 82 bits, so ids don't collide
/// even when many objects are created within the same instant.
pub fn new_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Checks that `id` looks like something returned by `new_id`
///
/// Ids supplied by a client are joined to storage paths, so anything else
/// (including `..` and slashes) must be rejected up front.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LEN &&
        id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}
