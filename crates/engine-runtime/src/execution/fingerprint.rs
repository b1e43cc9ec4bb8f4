use model::execution::job::JobSpec;

/// Stable hash of what a job would execute. Two jobs with the same
/// fingerprint and mode are interchangeable until one of them starts.
pub fn spec_fingerprint(spec: &JobSpec) -> String {
    let mut h = blake3::Hasher::new();
    match serde_json::to_vec(spec) {
        Ok(bytes) => {
            h.update(&bytes);
        }
        Err(_) => {
            h.update(format!("{spec:?}").as_bytes());
        }
    }
    format!("spec-{}", &h.finalize().to_hex()[..16])
}
