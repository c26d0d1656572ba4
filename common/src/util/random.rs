use rand::{distributions::Alphanumeric, thread_rng, Rng};

const STORAGE_NAME_LENGTH: usize = 30;

pub fn generate_alphanumeric(length: usize) -> String {
    thread_rng().sample_iter(&Alphanumeric).take(length).map(char::from).collect()
}

/// Fresh handle for an upload. 62^30 possibilities, collisions are not checked.
pub fn generate_storage_name() -> String {
    generate_alphanumeric(STORAGE_NAME_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_names_are_alphanumeric_and_distinct() {
        let first = generate_storage_name();
        let second = generate_storage_name();
        assert_eq!(first.len(), STORAGE_NAME_LENGTH);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }
}
