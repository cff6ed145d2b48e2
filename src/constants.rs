/// Shared constants so defaults and wire names stay consistent across
/// the validator, the wizard, and the CLI.

// Error key used when a team event has no members filled in.
pub const TEAM_MEMBERS_KEY: &str = "teamMembers";

// Default upper bound on the external confirm call.
pub const DEFAULT_CONFIRM_TIMEOUT_MS: u64 = 10_000;

// Where the event catalog lives unless config says otherwise.
pub const DEFAULT_CATALOG_PATH: &str = "catalog.toml";

// REST path the registration backend exposes for submissions.
pub const REGISTRATIONS_ENDPOINT: &str = "/api/registrations";
