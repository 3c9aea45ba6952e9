//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# palaver configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[models]
default_model = "gemini-3-pro-preview"

[[models.catalog]]
id = "gemini-3-pro-preview"
max_context_tokens = 1000000
max_output_tokens = 65536

[[models.catalog]]
id = "gemini-3-flash-preview"
max_context_tokens = 1000000
max_output_tokens = 65536

[[models.catalog]]
id = "gemini-2.0-flash-exp"
max_context_tokens = 1000000
max_output_tokens = 8192

[session]
# system_role = "You are a helpful and versatile AI assistant."
# stream_buffer = 64            # 1-4096 unread fragments
# chars_per_token = 4.0         # 1.0-16.0
# budget_warning_ratio = 0.9    # 0.1-1.0

[archive]
# directory = "/path/to/sessions"
# auto_save = true
# min_exchanges = 2             # 1-100

[logging]
# level = "INFO"                # DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
