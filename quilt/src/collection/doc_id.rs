use crate::common::DOC_ID_LENGTH;
use rand::rngs::OsRng;
use rand::RngCore;

/// How many fresh ids the service will try before giving up on a write.
/// With 96 random bits per id, hitting this bound means something is wrong
/// with the random source, not with the collection.
pub(crate) const MAX_ID_ATTEMPTS: u32 = 8;

/// Draws a random document id: 24 lowercase hex characters (96 bits) from
/// the operating system's random source.
pub fn random_doc_id() -> String {
    let mut bytes = [0u8; DOC_ID_LENGTH / 2];
    OsRng.fill_bytes(&mut bytes);
    let mut id = String::with_capacity(DOC_ID_LENGTH);
    for byte in bytes {
        id.push_str(&format!("{:02x}", byte));
    }
    id
}
