//! End-to-end replay tests
//!
//! These tests validate the complete pipeline using predefined CSV
//! fixtures. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Replays all operations through a fresh engine
//! 3. Generates output CSV
//! 4. Compares actual output with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Happy path (gift card, referral, purchase debit)
//! - Reward revocation after a refund
//! - Anti-abuse limits (per-IP cap, self-referral, order minimum)
//! - Error conditions (insufficient funds)

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use store_credit_engine::core::CheckoutEngine;
    use store_credit_engine::replay::Replayer;
    use store_credit_engine::Policy;
    use tempfile::NamedTempFile;

    /// Replay a fixture's input.csv and compare with its expected.csv
    fn run_test_fixture(fixture_name: &str) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );
        assert!(
            Path::new(&expected_path).exists(),
            "Expected file not found: {}",
            expected_path
        );

        let mut replayer = Replayer::new(CheckoutEngine::new(Policy::default()));
        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");

        replayer
            .run(Path::new(&input_path), &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to replay operations: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {}\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, actual_output, expected_output
        );
    }

    #[rstest]
    #[case::happy_path("happy_path")]
    #[case::revocation_flow("revocation_flow")]
    #[case::ip_limit("ip_limit")]
    #[case::self_referral("self_referral")]
    #[case::insufficient_funds("insufficient_funds")]
    #[case::minimum_not_met("minimum_not_met")]
    fn test_fixture(#[case] fixture_name: &str) {
        run_test_fixture(fixture_name);
    }
}
