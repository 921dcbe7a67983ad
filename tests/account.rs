#[cfg(test)]
mod integration_tests {
    use acolyte::{Account, Error, MAX_ONE_TIME_KEYS};
    use rand::RngCore;

    fn entropy(len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        rand::rng().fill_bytes(&mut bytes);
        bytes
    }

    #[test]
    fn test_full_account_lifecycle() {
        println!("Step 1: Creating Bob's account from caller-supplied entropy...");
        let mut bob_account =
            Account::new(&entropy(Account::new_account_random_length())).unwrap();

        println!("Step 2: Bob publishes his identity keys...");
        let identity_keys = bob_account.identity_keys();
        assert!(identity_keys.contains("\"curve25519\""));
        assert!(identity_keys.contains("\"ed25519\""));

        println!("Step 3: Bob generates a batch of one-time keys...");
        let generated = bob_account
            .generate_one_time_keys(10, &entropy(Account::one_time_keys_random_length(10)))
            .unwrap();
        assert_eq!(generated, 10);

        println!("Step 4: Bob uploads the unpublished keys and marks them published...");
        let first_upload = bob_account.one_time_keys();
        assert_ne!(first_upload, "{\"curve25519\":{}}");
        bob_account.mark_keys_as_published();
        assert_eq!(bob_account.one_time_keys(), "{\"curve25519\":{}}");

        println!("Step 5: Bob signs his pre-key upload with the identity key...");
        let signature = bob_account.sign(first_upload.as_bytes());
        assert!(
            bob_account
                .identity_key()
                .verify(first_upload.as_bytes(), &signature)
                .is_ok()
        );

        println!("Step 6: A peer session claims one-time key 7...");
        assert!(bob_account.lookup_key(7).is_some());
        bob_account.remove_key(7).unwrap();

        println!("Step 7: A replayed claim of the same key is rejected...");
        let replay = bob_account.remove_key(7);
        assert_eq!(replay.err(), Some(Error::UnknownOneTimeKey(7)));
        assert_eq!(bob_account.last_error(), Some(Error::UnknownOneTimeKey(7)));

        println!("Step 8: Bob tops the pool back up...");
        bob_account
            .generate_one_time_keys(1, &entropy(Account::one_time_keys_random_length(1)))
            .unwrap();
        assert!(bob_account.lookup_key(11).is_some());

        println!("Step 9: Bob persists the account under a pickle key...");
        let pickle_key = b"bob's device key";
        let pickled = bob_account.pickle(pickle_key).unwrap();

        println!("Step 10: Bob restores the account after a restart...");
        let restored = Account::from_pickle(&pickled, pickle_key).unwrap();
        assert_eq!(restored.identity_keys(), bob_account.identity_keys());
        assert_eq!(restored.one_time_keys(), bob_account.one_time_keys());

        println!("Step 11: The restored identity still signs interchangeably...");
        let message = b"post-restart message";
        let restored_signature = restored.sign(message);
        assert!(
            bob_account
                .identity_key()
                .verify(message, &restored_signature)
                .is_ok()
        );

        println!("Step 12: The wrong pickle key is rejected...");
        let wrong = Account::from_pickle(&pickled, b"mallory's guess");
        assert_eq!(wrong.err(), Some(Error::BadAccountKey));

        println!("All account lifecycle steps passed successfully!");
    }

    #[test]
    fn test_capacity_is_a_hard_bound() {
        let mut account = Account::new(&entropy(Account::new_account_random_length())).unwrap();

        account
            .generate_one_time_keys(
                MAX_ONE_TIME_KEYS,
                &entropy(Account::one_time_keys_random_length(MAX_ONE_TIME_KEYS)),
            )
            .unwrap();

        // A full pool rejects the whole batch, no matter how small.
        let overflow = account
            .generate_one_time_keys(1, &entropy(Account::one_time_keys_random_length(1)));
        assert_eq!(overflow.err(), Some(Error::MaxOneTimeKeys));

        // Removal frees capacity again.
        account.remove_key(1).unwrap();
        account
            .generate_one_time_keys(1, &entropy(Account::one_time_keys_random_length(1)))
            .unwrap();
        assert!(account.lookup_key(MAX_ONE_TIME_KEYS as u32 + 1).is_some());
    }

    #[test]
    fn test_signature_flips_do_not_verify() {
        let account = Account::new(&entropy(Account::new_account_random_length())).unwrap();
        let message = b"attested pre-key bundle";

        let mut signature_bytes = account.sign(message).to_bytes();
        signature_bytes[17] ^= 0x01;
        let flipped = ed25519_dalek::Signature::from_bytes(&signature_bytes);

        assert!(account.identity_key().verify(message, &flipped).is_err());
    }

    #[test]
    fn test_pickle_survives_many_generations_of_churn() {
        let mut account = Account::new(&entropy(Account::new_account_random_length())).unwrap();

        for round in 0..10u32 {
            account
                .generate_one_time_keys(5, &entropy(Account::one_time_keys_random_length(5)))
                .unwrap();
            account.mark_keys_as_published();

            // Claim two keys from this round, as sessions would.
            account.remove_key(round * 5 + 1).unwrap();
            account.remove_key(round * 5 + 3).unwrap();

            let pickled = account.pickle(b"churn key").unwrap();
            let restored = Account::from_pickle(&pickled, b"churn key").unwrap();
            assert_eq!(restored.to_pickle(), account.to_pickle());
            account = restored;
        }
    }
}
