// Storage naming for queue identifiers
//
// The queue primitive forbids ':' in names, so identifiers are stored with
// ':' replaced by '_'. Identifier segments never contain '_', which keeps the
// mapping reversible.

use tenantq_core::domain::Orid;

const DELIMITER: char = ':';
const ESCAPED_DELIMITER: char = '_';
const META_PREFIX: &str = "queue-meta:";

/// Storage name of a queue
pub fn escape(orid: &Orid) -> String {
    escape_str(&orid.to_string())
}

/// Storage form of any key derived from an identifier
pub fn escape_str(text: &str) -> String {
    text.replace(DELIMITER, &ESCAPED_DELIMITER.to_string())
}

/// Human encoding of a storage name
pub fn unescape(name: &str) -> String {
    name.replace(ESCAPED_DELIMITER, &DELIMITER.to_string())
}

/// Key of the queue's metadata record
pub fn meta_key(orid: &Orid) -> String {
    format!("{META_PREFIX}{}", escape(orid))
}
