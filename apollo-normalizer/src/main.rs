//! Main entry point for CLI command to normalize a response.

use anyhow::Result;

fn main() -> Result<()> {
    apollo_normalizer::main()
}
