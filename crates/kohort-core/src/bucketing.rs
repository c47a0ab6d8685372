//! Deterministic user bucketing.
//!
//! A user's bucket is a pure function of a salt, the experiment id and the
//! user id: MD5 over `"{salt}-{experiment_id}-{user_id}"`, the first four
//! digest bytes read as a big-endian `u32`, reduced modulo
//! [`TOTAL_BUCKETS`]. The same inputs give the same bucket on every replica
//! and across restarts. Changing the hash or a salt reshuffles every
//! existing assignment.

use uuid::Uuid;

use crate::experiment::{Experiment, Variant};

/// Buckets in the assignment domain; matches the total variant weight.
pub const TOTAL_BUCKETS: u32 = 100;

/// Salt for variant bucketing.
pub const BUCKETING_SALT: &str = "bucket";

/// Salt for the `percentage` targeting gate. Distinct from
/// [`BUCKETING_SALT`] so that widening a gate does not move users between
/// variants.
pub const TARGETING_SALT: &str = "gate";

/// The bucket in `0..TOTAL_BUCKETS` for this user under `salt`.
pub fn bucket(salt: &str, experiment_id: Uuid, user_id: &str) -> u32 {
  shard(format!("{salt}-{experiment_id}-{user_id}"), TOTAL_BUCKETS)
}

/// First four MD5 digest bytes, big-endian, reduced modulo `total`.
fn shard(input: impl AsRef<[u8]>, total: u32) -> u32 {
  let digest = md5::compute(input);
  u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) % total
}

/// Pick the variant for `user_id`.
///
/// Boundaries are cumulative weights in declaration order: `[0, w0)`,
/// `[w0, w0 + w1)`, and so on. Changing one variant's weight leaves the
/// ranges of the variants before it untouched.
///
/// Returns `None` only if the weights do not cover the bucket, which a
/// validated experiment rules out.
pub fn assign_variant<'a>(
  experiment: &'a Experiment,
  user_id: &str,
) -> Option<&'a Variant> {
  let h = bucket(BUCKETING_SALT, experiment.id, user_id);
  let mut upper = 0;
  experiment.variants.iter().find(|variant| {
    upper += variant.weight;
    h < upper
  })
}
