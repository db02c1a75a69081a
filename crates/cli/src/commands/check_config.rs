//! Configuration check command.
//!
//! Loads the server configuration exactly as the server would and prints a
//! summary. Secrets are never printed.

use rhythm_deck_core::PaidTerm;
use rhythm_deck_server::config::{ConfigError, ServerConfig, price_var};

/// Validate the configuration and print what the server would run with.
///
/// # Errors
///
/// Returns `ConfigError` for anything that would stop the server starting.
#[allow(clippy::print_stdout)]
pub fn run() -> Result<(), ConfigError> {
    let config = ServerConfig::from_env()?;

    println!("listen address:      {}", config.socket_addr());
    println!("base url:            {}", config.base_url);
    println!("identity provider:   {}", config.identity.url);
    println!("static dir:          {}", config.static_dir.display());
    println!(
        "collaborator timeout: {}s",
        config.collaborator_timeout.as_secs()
    );

    match &config.payments {
        Some(stripe) => {
            println!("payments:            enabled ({})", stripe.api_base);
            for term in PaidTerm::ALL {
                println!(
                    "  {:<18} {}",
                    price_var(term),
                    stripe.prices.price_for(term)
                );
            }
        }
        None => println!("payments:            disabled (paid plans complete with a warning)"),
    }

    Ok(())
}
