use courier::config::{EnvConfig, MailConfig};
use courier::mail::{Address, MailerBuilder};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct TestConfig {
    host: String,
    port: u16,
    debug: bool,
}

#[test]
fn env_config_with_prefix() {
    std::env::set_var("COURIERTEST_HOST", "0.0.0.0");
    std::env::set_var("COURIERTEST_PORT", "3000");
    std::env::set_var("COURIERTEST_DEBUG", "false");

    let config = TestConfig::from_env_with_prefix("COURIERTEST").unwrap();

    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 3000);
    assert!(!config.debug);

    std::env::remove_var("COURIERTEST_HOST");
    std::env::remove_var("COURIERTEST_PORT");
    std::env::remove_var("COURIERTEST_DEBUG");
}

#[test]
fn mail_config_defaults_and_overrides() {
    std::env::set_var("MAIL_DEFAULT_QUEUE", "emails");
    std::env::set_var("MAIL_FROM_ADDRESS", "noreply@example.com");
    std::env::set_var("MAIL_FROM_NAME", "Example");

    let config = MailConfig::load().unwrap();

    assert_eq!(config.default_mailer, "smtp");
    assert_eq!(config.default_queue, "emails");
    assert_eq!(config.default_disk, "local");
    assert_eq!(
        config.always_from(),
        Some(Address::with_name("noreply@example.com", "Example"))
    );

    std::env::remove_var("MAIL_DEFAULT_QUEUE");
    std::env::remove_var("MAIL_FROM_ADDRESS");
    std::env::remove_var("MAIL_FROM_NAME");
}

#[test]
fn mailer_builder_takes_defaults_from_config() {
    let config = MailConfig {
        default_mailer: "postmark".into(),
        default_queue: "emails".into(),
        ..Default::default()
    };

    let mailer = MailerBuilder::from_config(&config).build();

    assert_eq!(mailer.default_mailer(), "postmark");
    assert_eq!(mailer.default_queue(), "emails");
    assert_eq!(MailConfig::default().always_from(), None);
}
