//! Target identity hashing.
//!
//! [`TargetHasher`] computes a stable SHA-256 digest over a target's name
//! and build variables. Two descriptors with the same digest describe the
//! same build variant and collapse to one node in the graph; dependency
//! files do not take part in the identity.
//!
//! # Examples
//!
//! ```
//! use bootgraph::hasher::TargetHasher;
//! use bootgraph::model::Target;
//!
//! let target = Target {
//!     name: "x64".into(),
//!     variables: [("arch".to_owned(), "x86_64".to_owned())].into_iter().collect(),
//!     depfiles: Vec::new(),
//! };
//! assert_eq!(TargetHasher::hash(&target).len(), 64);
//! ```

use sha2::{Digest, Sha256};

use crate::model::Target;

/// Computes stable identity digests for [`Target`] descriptors.
pub struct TargetHasher;

impl TargetHasher {
    /// Calculate the identity digest of a [`Target`].
    ///
    /// Variables are hashed in sorted key order, so declaration order does
    /// not change the identity.
    #[must_use]
    pub fn hash(target: &Target) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"name");
        Self::update_with_len(&mut hasher, target.name.as_bytes());
        let mut vars: Vec<_> = target.variables.iter().collect();
        vars.sort();
        hasher.update(format!("vars{}:", vars.len()).as_bytes());
        for (key, value) in vars {
            Self::update_with_len(&mut hasher, key.as_bytes());
            Self::update_with_len(&mut hasher, value.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    fn update_with_len(hasher: &mut Sha256, bytes: &[u8]) {
        let len = bytes.len();
        hasher.update(format!("{len}:").as_bytes());
        hasher.update(bytes);
    }
}
