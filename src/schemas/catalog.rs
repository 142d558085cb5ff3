// The static catalog of recognized INI settings, plus the fixed rule that
// maps DD_* environment-variable style names onto datadog.* INI names.
//
// The catalog backs three things: validation of user-supplied `-d` settings,
// the backfill pass that appends missing entries to a freshly written INI
// file, and the defaults column of `config get`/`config list`.

use std::path::PathBuf;

/// One recognized INI setting.
///
/// `commented` says whether backfill writes the entry as `;name = default`
/// (documentation only) or as an active `name = default` line. The
/// description is rendered as `;`-prefixed lines above the entry.
#[derive(Debug, Clone)]
pub struct IniSettingSpec {
    pub name: &'static str,
    pub default: String,
    pub commented: bool,
    pub description: &'static [&'static str],
}

/// One observed setting, built transiently for `config get`/`config list`.
#[derive(Debug, Clone)]
pub struct IniRecord {
    pub name: String,
    pub value: Option<String>,
    pub default: Option<String>,
    pub source: Option<PathBuf>,
    pub binary: String,
}

fn spec(
    name: &'static str,
    default: impl Into<String>,
    commented: bool,
    description: &'static [&'static str],
) -> IniSettingSpec {
    IniSettingSpec { name, default: default.into(), commented, description }
}

/// Builds the full setting catalog.
///
/// Three defaults are only known at install time and are passed in: the
/// request init hook path, the appsec helper binary path, and the appsec
/// rules file path. Callers that only need names and static defaults (e.g.
/// `config list`) pass empty strings.
pub fn ini_settings(
    request_init_hook: &str,
    appsec_helper_path: &str,
    appsec_rules_path: &str,
) -> Vec<IniSettingSpec> {
    vec![
        spec("extension", "ddtrace.so", false, &[
            "Enables or disables tracing (set by the installer, do not change it)",
        ]),
        spec("zend_extension", "datadog-profiling.so", true, &[
            "Enables the profiling module",
        ]),
        spec("extension", "ddappsec.so", true, &[
            "Enables the application security monitoring module",
        ]),
        spec("datadog.trace.request_init_hook", request_init_hook, false, &[
            "Path to the request init hook (set by the installer, do not change it)",
        ]),
        spec("datadog.trace.enabled", "On", true, &[
            "Enables or disables tracing. On by default",
        ]),
        spec("datadog.trace.cli_enabled", "Off", true, &[
            "Enable or disable tracing of CLI scripts. Off by default",
        ]),
        spec("datadog.trace.auto_flush_enabled", "Off", true, &[
            "For long running processes, this setting has to be set to On",
        ]),
        spec("datadog.trace.generate_root_span", "On", true, &[
            "For long running processes, this setting has to be set to Off",
        ]),
        spec("datadog.trace.debug", "Off", true, &[
            "Enables or disables debug mode. When On logs are printed to the error_log",
        ]),
        spec("datadog.trace.startup_logs", "On", true, &[
            "Enables startup logs, including diagnostic checks",
        ]),
        spec("datadog.service", "unnamed-php-service", true, &[
            "Sets a custom service name for the application",
        ]),
        spec("datadog.env", "my_env", true, &[
            "Sets a custom environment name for the application",
        ]),
        spec("datadog.version", "1.0.0", true, &[
            "Sets a version for the user application, not the datadog php library",
        ]),
        spec("datadog.agent_host", "127.0.0.1", true, &[
            "Configures the agent host. If you need more flexibility use `datadog.trace.agent_url` instead",
        ]),
        spec("datadog.trace.agent_port", "8126", true, &[
            "Configures the agent port. If you need more flexibility use `datadog.trace.agent_url` instead",
        ]),
        spec("datadog.dogstatsd_port", "8125", true, &[
            "Configures the dogstatsd agent port",
        ]),
        spec("datadog.trace.agent_url", "http://127.0.0.1:8126", true, &[
            "When set, `datadog.trace.agent_url` has priority over `datadog.agent_host` and `datadog.trace.agent_port`",
        ]),
        spec("datadog.trace.http_client_split_by_domain", "Off", true, &[
            "Sets the service name of spans generated for HTTP clients' requests to host-<hostname>",
        ]),
        spec("datadog.trace.url_as_resource_names_enabled", "On", true, &[
            "Enables URL to resource name normalization",
        ]),
        spec("datadog.trace.resource_uri_fragment_regex", "", true, &[
            "Configures obfuscation patterns based on regex",
        ]),
        spec("datadog.trace.resource_uri_mapping_incoming", "", true, &[
            "Configures obfuscation path fragments for incoming requests",
        ]),
        spec("datadog.trace.resource_uri_mapping_outgoing", "", true, &[
            "Configures obfuscation path fragments for outgoing requests",
        ]),
        spec("datadog.service_mapping", "", true, &[
            "Changes the default name of an APM integration. Rename one or more integrations at a time, for example:",
            "\"pdo:payments-db,mysqli:orders-db\"",
        ]),
        spec("datadog.tags", "", true, &[
            "Tags to be set on all spans, for example: \"key1:value1,key2:value2\"",
        ]),
        spec("datadog.trace.sample_rate", "1.0", true, &[
            "The sampling rate for the trace. Valid values are between 0.0 and 1.0",
        ]),
        spec("datadog.trace.sampling_rules", "", true, &[
            "A JSON encoded string to configure the sampling rate.",
            "Example, setting the sample rate to 20%: '[{\"sample_rate\": 0.2}]'.",
            "Note that the JSON object must be included in single quotes (') to avoid problems with escaping of the",
            "double quote (\") character.",
        ]),
        spec("datadog.distributed_tracing", "On", true, &[
            "Enables distributed tracing",
        ]),
        spec("datadog.trace.analytics_enabled", "Off", true, &[
            "Global switch for trace analytics",
        ]),
        spec("datadog.trace.bgs_connect_timeout", "2000", true, &[
            "Set connection timeout in milliseconds while connecting to the agent",
        ]),
        spec("datadog.trace.bgs_timeout", "5000", true, &[
            "Set request timeout in milliseconds while sending payloads to the agent",
        ]),
        spec("datadog.trace.spans_limit", "1000", true, &[
            "Set the maximum number of spans generated per trace during a single request",
        ]),
        spec("datadog.trace.report_hostname", "Off", true, &[
            "Enables hostname reporting on root spans",
        ]),
        spec("datadog.trace.measure_compile_time", "On", true, &[
            "Records the compile time of the initial script into the root span",
        ]),
        spec("datadog.trace.retain_thread_capabilities", "Off", true, &[
            "Only for Linux. Set to `true` to retain capabilities on Datadog background threads when you change",
            "the effective user ID. This option does not affect most setups, but some modules may invoke `setuid()`",
            "or similar syscalls, leading to crashes or loss of functionality as it loses capabilities.",
        ]),
        spec("datadog.profiling.enabled", "Off", true, &[
            "Enables or disables the profiler",
        ]),
        spec("datadog.profiling.log_level", "off", true, &[
            "Sets the verbosity of the profiler logs. Valid values are 'off', 'error', 'warn', 'info', 'debug' and 'trace'",
        ]),
        spec("ddappsec.enabled", "Off", true, &[
            "Enables or disables the loaded dd-appsec extension.",
            "If disabled, the extension will do no work during the requests.",
            "This value is ignored on the CLI SAPI, see ddappsec.enabled_on_cli",
        ]),
        spec("ddappsec.enabled_on_cli", "Off", true, &[
            "Enables or disables the loaded dd-appsec extension for the CLI SAPI",
        ]),
        spec("ddappsec.block", "On", true, &[
            "Allows dd-appsec to block attacks by committing an error page response and aborting the request",
        ]),
        spec("ddappsec.log_level", "warn", true, &[
            "Sets the verbosity of the logs of the dd-appsec extension.",
            "The valid values are 'off', 'error', 'fatal', 'warn', 'info', 'debug' and 'trace'",
        ]),
        spec("ddappsec.log_file", "php_error_reporting", true, &[
            "The destination of the log messages. Valid values are 'php_error_reporting', 'syslog', 'stdout',",
            "'stderr', or an arbitrary file name to which the messages will be appended",
        ]),
        spec("ddappsec.helper_launch", "On", true, &[
            "Whether the extension should try to launch the helper daemon when it cannot obtain a connection",
        ]),
        spec("ddappsec.helper_path", appsec_helper_path, false, &[
            "The helper binary the extension launches. This ini setting is configured by the installer",
        ]),
        spec("ddappsec.helper_extra_args", "", true, &[
            "Additional space-separated arguments used when launching the helper process",
        ]),
        spec("ddappsec.rules_path", appsec_rules_path, false, &[
            "The path to the rules json file. The helper process must be able to read the file.",
            "This ini setting is configured by the installer",
        ]),
        spec("ddappsec.helper_socket_path", "/tmp/ddappsec.sock", true, &[
            "The UNIX socket the extension uses to communicate with the helper",
        ]),
        spec("ddappsec.helper_lock_path", "/tmp/ddappsec.lock", true, &[
            "The lock file used to synchronize the launching of the helper",
        ]),
        spec("ddappsec.helper_log_file", "/dev/null", true, &[
            "The log file of the helper, passed to it as stderr when launched by the extension",
        ]),
    ]
}

/// Looks a setting up by its (already normalized) name.
///
/// `extension`/`zend_extension` appear more than once in the catalog (one
/// entry per module); the first entry wins, which is the tracing one.
pub fn find_setting(name: &str) -> Option<IniSettingSpec> {
    ini_settings("", "", "").into_iter().find(|s| s.name == name)
}

/// Maps a DD_* environment-variable style name to its datadog.* INI name.
///
/// The split is positional: the first path component after DD_ decides the
/// namespace (`DD_TRACE_X` -> `datadog.trace.x`, `DD_APPSEC_X` ->
/// `datadog.appsec.x`, `DD_PROFILING_X` -> `datadog.profiling.x`, anything
/// else `DD_X` -> `datadog.x`), the rest is lower-cased verbatim. Names not
/// starting with DD_ pass through unchanged.
pub fn normalize_setting_name(name: &str) -> String {
    let Some(rest) = name.strip_prefix("DD_") else {
        return name.to_string();
    };
    for (env_ns, ini_ns) in [
        ("TRACE_", "datadog.trace."),
        ("APPSEC_", "datadog.appsec."),
        ("PROFILING_", "datadog.profiling."),
    ] {
        if let Some(tail) = rest.strip_prefix(env_ns) {
            return format!("{ini_ns}{}", tail.to_lowercase());
        }
    }
    format!("datadog.{}", rest.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_names_map_to_ini_names() {
        assert_eq!(normalize_setting_name("DD_TRACE_ENABLED"), "datadog.trace.enabled");
        assert_eq!(normalize_setting_name("DD_TRACE_SAMPLE_RATE"), "datadog.trace.sample_rate");
        assert_eq!(normalize_setting_name("DD_APPSEC_ENABLED"), "datadog.appsec.enabled");
        assert_eq!(normalize_setting_name("DD_PROFILING_LOG_LEVEL"), "datadog.profiling.log_level");
        assert_eq!(normalize_setting_name("DD_ENV"), "datadog.env");
        assert_eq!(normalize_setting_name("DD_SERVICE"), "datadog.service");
    }

    #[test]
    fn non_env_names_pass_through() {
        assert_eq!(normalize_setting_name("datadog.trace.enabled"), "datadog.trace.enabled");
        assert_eq!(normalize_setting_name("extension"), "extension");
    }

    #[test]
    fn catalog_contains_both_extension_defaults() {
        let settings = ini_settings("", "", "");
        let loaders: Vec<&str> = settings
            .iter()
            .filter(|s| s.name == "extension" || s.name == "zend_extension")
            .map(|s| s.default.as_str())
            .collect();
        assert!(loaders.contains(&"ddtrace.so"));
        assert!(loaders.contains(&"datadog-profiling.so"));
        assert!(loaders.contains(&"ddappsec.so"));
    }

    #[test]
    fn find_setting_prefers_the_tracing_extension_entry() {
        let found = find_setting("extension").unwrap();
        assert_eq!(found.default, "ddtrace.so");
        assert!(!found.commented);
    }

    #[test]
    fn install_time_defaults_are_threaded_through() {
        let settings = ini_settings("/opt/hook.php", "/opt/helper", "/opt/rules.json");
        let hook = settings
            .iter()
            .find(|s| s.name == "datadog.trace.request_init_hook")
            .unwrap();
        assert_eq!(hook.default, "/opt/hook.php");
        let helper = settings.iter().find(|s| s.name == "ddappsec.helper_path").unwrap();
        assert_eq!(helper.default, "/opt/helper");
    }
}
