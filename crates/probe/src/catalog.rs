//! Built-in probe lists.
//!
//! These are the only commands the tool runs when no configuration file is
//! given. Every command is launched directly, never through a shell.

use hostaudit_common::OsType;
use hostaudit_report_schema::{validate_specs, ConfigError, Grammar, ProbeSpec};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

fn probe(
    name: &str,
    command: &str,
    args: &[&str],
    grammar: Grammar,
    timeout: Duration,
) -> Result<ProbeSpec, ConfigError> {
    ProbeSpec::new(name, command, args, grammar, timeout)
}

fn powershell(name: &str, script: &str, grammar: Grammar) -> Result<ProbeSpec, ConfigError> {
    probe(
        name,
        "powershell",
        &["-NoProfile", "-NonInteractive", "-Command", script],
        grammar,
        DEFAULT_TIMEOUT,
    )
}

fn columns(names: &[&str], min_fields: usize) -> Grammar {
    Grammar::Table {
        columns: names.iter().map(|n| n.to_string()).collect(),
        header: false,
        min_fields,
    }
}

fn windows_probes() -> Result<Vec<ProbeSpec>, ConfigError> {
    Ok(vec![
        probe(
            "firewall_profiles",
            "netsh",
            &["advfirewall", "show", "allprofiles"],
            Grammar::ProfileBlock,
            Duration::from_secs(30),
        )?,
        probe(
            "antivirus_products",
            "wmic",
            &[
                r"/namespace:\\root\SecurityCenter2",
                "path",
                "AntiVirusProduct",
                "get",
                "displayName,productState",
                "/format:list",
            ],
            Grammar::SecurityProduct,
            Duration::from_secs(30),
        )?,
        powershell(
            "local_users",
            "Get-LocalUser | Select-Object Name,Enabled,LastLogon | Format-Table -HideTableHeaders",
            columns(&["Name", "Enabled", "LastLogon"], 2),
        )?,
        powershell(
            "administrators",
            "Get-LocalGroupMember -Group Administrators | Select-Object Name,PrincipalSource | Format-Table -HideTableHeaders",
            columns(&["Name", "PrincipalSource"], 1),
        )?,
        probe(
            "password_policy",
            "net",
            &["accounts"],
            Grammar::key_value(':'),
            Duration::from_secs(30),
        )?,
        probe(
            "account_flags",
            "wmic",
            &[
                "useraccount",
                "get",
                "Name,SID,Disabled,Lockout,PasswordRequired,PasswordExpires",
                "/format:csv",
            ],
            Grammar::csv(),
            DEFAULT_TIMEOUT,
        )?,
        probe(
            "installed_patches",
            "wmic",
            &["qfe", "get", "HotFixID,Description,InstalledOn"],
            Grammar::table_with_header(1),
            DEFAULT_TIMEOUT,
        )?,
        probe(
            "services",
            "wmic",
            &["service", "get", "Name,StartMode,State"],
            Grammar::table_with_header(2),
            DEFAULT_TIMEOUT,
        )?,
        probe(
            "startup_apps",
            "wmic",
            &["startup", "get", "Caption,Command,Location"],
            Grammar::table_with_header(2),
            DEFAULT_TIMEOUT,
        )?,
        probe(
            "scheduled_tasks",
            "schtasks",
            &["/query", "/fo", "csv"],
            Grammar::csv(),
            Duration::from_secs(90),
        )?,
        probe(
            "installed_apps",
            "wmic",
            &["product", "get", "Name,Version,Vendor"],
            Grammar::table_with_header(1),
            Duration::from_secs(180),
        )?,
        probe(
            "network_connections",
            "netstat",
            &["-an"],
            columns(&["Proto", "Local Address", "Foreign Address", "State"], 3),
            DEFAULT_TIMEOUT,
        )?,
        probe(
            "system_info",
            "systeminfo",
            &["/fo", "csv"],
            Grammar::csv(),
            Duration::from_secs(90),
        )?,
        powershell(
            "sensitive_hives",
            r"Get-Item -Force -ErrorAction SilentlyContinue C:\Windows\System32\config\SAM,C:\Windows\System32\config\SYSTEM,C:\Windows\System32\config\SECURITY | ForEach-Object { '{0}  {1:o}' -f $_.FullName, $_.LastWriteTimeUtc }",
            columns(&["Path", "LastWriteTime"], 2),
        )?,
        probe(
            "hidden_system_files",
            "powershell",
            &[
                "-NoProfile",
                "-NonInteractive",
                "-Command",
                r"Get-ChildItem -Path $env:SystemDrive\Users -Recurse -File -Force -Attributes Hidden,System -ErrorAction SilentlyContinue | ForEach-Object { '{0}  {1}' -f $_.FullName, $_.Attributes }",
            ],
            columns(&["Path", "Attributes"], 2),
            Duration::from_secs(300),
        )?,
        powershell(
            "logon_history",
            "Get-WinEvent -FilterHashtable @{LogName='Security';Id=4624} -MaxEvents 20 | Format-List TimeCreated,Message",
            Grammar::Raw,
        )?,
    ])
}

fn linux_probes() -> Result<Vec<ProbeSpec>, ConfigError> {
    Ok(vec![
        probe(
            "accounts",
            "getent",
            &["passwd"],
            Grammar::Delimited {
                delimiter: ':',
                columns: ["user", "password", "uid", "gid", "gecos", "home", "shell"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                header: false,
            },
            Duration::from_secs(30),
        )?,
        probe(
            "groups",
            "getent",
            &["group"],
            Grammar::Delimited {
                delimiter: ':',
                columns: ["group", "password", "gid", "members"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                header: false,
            },
            Duration::from_secs(30),
        )?,
        probe(
            "services",
            "systemctl",
            &[
                "list-units",
                "--type=service",
                "--all",
                "--no-pager",
                "--no-legend",
                "--plain",
            ],
            columns(&["Unit", "Load", "Active", "Sub", "Description"], 4),
            DEFAULT_TIMEOUT,
        )?,
        probe(
            "firewall",
            "ufw",
            &["status", "verbose"],
            Grammar::key_value(':'),
            Duration::from_secs(30),
        )?,
        probe(
            "listening_sockets",
            "ss",
            &["-ltnu"],
            Grammar::Raw,
            Duration::from_secs(30),
        )?,
    ])
}

/// The built-in probe list for `os`.
pub fn builtin_probes(os: OsType) -> Result<Vec<ProbeSpec>, ConfigError> {
    let probes = match os {
        OsType::Windows => windows_probes()?,
        OsType::Linux => linux_probes()?,
    };
    validate_specs(&probes)?;
    Ok(probes)
}
