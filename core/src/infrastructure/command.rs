//! Hook-tool command builder and output parser.
//!
//! `CommandHost` implements `HostBackend` by building hook-tool, apt and
//! service command strings and handing them to a `CommandRunner`. The
//! builder half (`HookCommandBuilder`) never runs anything, so every command
//! line can be checked in tests.

use serde_json::Value;

use crate::network::{parse_ip_addr_output, InterfaceAddr};
use crate::types::action::HostAction;
use crate::types::relation::{Advertisement, RelationData};

use super::runner::CommandRunner;
use super::HostBackend;

// ---------------------------------------------------------------------------
// Command builder
// ---------------------------------------------------------------------------

/// Builds command strings without executing them.
pub struct HookCommandBuilder;

impl HookCommandBuilder {
    pub fn new() -> Self {
        HookCommandBuilder
    }

    /// `add-apt-repository --yes <source>`
    pub fn add_source(&self, source: &str) -> String {
        format!("add-apt-repository --yes {}", shell_escape(source))
    }

    pub fn apt_update(&self) -> String {
        "apt-get update".to_string()
    }

    /// Non-interactive install that keeps locally modified config files.
    pub fn apt_install(&self, packages: &[String]) -> String {
        let pkgs: Vec<String> = packages.iter().map(|p| shell_escape(p)).collect();
        format!(
            "DEBIAN_FRONTEND=noninteractive apt-get --assume-yes --option Dpkg::Options::=--force-confold install {}",
            pkgs.join(" ")
        )
    }

    pub fn apt_upgrade(&self) -> String {
        "DEBIAN_FRONTEND=noninteractive apt-get --assume-yes --option Dpkg::Options::=--force-confnew dist-upgrade".to_string()
    }

    /// `open-port <port>/TCP`
    pub fn open_port(&self, port: u16) -> String {
        format!("open-port {}/TCP", port)
    }

    /// `service <name> <verb>`
    pub fn service(&self, name: &str, verb: &str) -> String {
        format!("service {} {}", shell_escape(name), verb)
    }

    pub fn enable_site(&self, site: &str) -> String {
        format!("a2ensite {}", shell_escape(site))
    }

    pub fn disable_site(&self, site: &str) -> String {
        format!("a2dissite {}", shell_escape(site))
    }

    /// `relation-set [-r <id>] key=value ...`
    pub fn relation_set(&self, adv: &Advertisement) -> String {
        let mut cmd = String::from("relation-set");
        if let Some(rid) = &adv.relation_id {
            cmd.push_str(" -r ");
            cmd.push_str(&shell_escape(rid));
        }
        for (key, value) in adv.wire_pairs() {
            cmd.push(' ');
            cmd.push_str(&shell_escape(&format!("{}={}", key, value)));
        }
        cmd
    }

    pub fn relation_ids(&self, relation: &str) -> String {
        format!("relation-ids {}", shell_escape(relation))
    }

    pub fn relation_list(&self, relation_id: &str) -> String {
        format!("relation-list -r {}", shell_escape(relation_id))
    }

    pub fn relation_get(&self, relation_id: &str, unit: &str) -> String {
        format!(
            "relation-get --format=json -r {} - {}",
            shell_escape(relation_id),
            shell_escape(unit)
        )
    }

    pub fn unit_get(&self, key: &str) -> String {
        format!("unit-get {}", shell_escape(key))
    }

    pub fn ip_addr(&self) -> String {
        "ip -o addr show".to_string()
    }

    /// Status of each package, one `<name> <status>` line per package.
    pub fn dpkg_status(&self, packages: &[String]) -> String {
        let pkgs: Vec<String> = packages.iter().map(|p| shell_escape(p)).collect();
        format!(
            "dpkg-query -W -f='${{Package}} ${{Status}}\\n' {} 2>/dev/null || true",
            pkgs.join(" ")
        )
    }

    pub fn apt_policy(&self, package: &str) -> String {
        format!("apt-cache policy {}", shell_escape(package))
    }

    /// The command line(s) that carry out an action.
    pub fn for_action(&self, action: &HostAction) -> Vec<String> {
        match action {
            HostAction::AddSource { source } => vec![self.add_source(source)],
            HostAction::AptUpdate => vec![self.apt_update()],
            HostAction::AptInstall { packages } => {
                if packages.is_empty() {
                    Vec::new()
                } else {
                    vec![self.apt_install(packages)]
                }
            }
            HostAction::AptUpgrade => vec![self.apt_upgrade()],
            HostAction::OpenPort { port } => vec![self.open_port(*port)],
            HostAction::ServiceRestart { service } => vec![self.service(service, "restart")],
            HostAction::ServiceStop { service } => vec![self.service(service, "stop")],
            HostAction::ServiceStart { service } => vec![self.service(service, "start")],
            HostAction::EnableSite { site } => vec![self.enable_site(site)],
            HostAction::DisableSite { site } => vec![self.disable_site(site)],
            HostAction::RelationSet { advertisement } => vec![self.relation_set(advertisement)],
        }
    }
}

impl Default for HookCommandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Output parsers
// ---------------------------------------------------------------------------

/// Non-empty lines of a listing command.
pub fn parse_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect()
}

/// `relation-get --format=json` output. Non-object payloads (`null` for a
/// unit that published nothing) read as empty.
pub fn parse_relation_json(output: &str) -> Result<RelationData, String> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(RelationData::new());
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(_) => Ok(RelationData::new()),
        Err(e) => Err(format!("relation-get returned invalid JSON: {}", e)),
    }
}

/// Packages whose dpkg status line does not say `install ok installed`.
pub fn parse_missing_packages(packages: &[String], dpkg_output: &str) -> Vec<String> {
    packages
        .iter()
        .filter(|pkg| {
            !dpkg_output.lines().any(|line| {
                let mut parts = line.splitn(2, ' ');
                parts.next() == Some(pkg.as_str())
                    && parts.next().map_or(false, |s| s.trim() == "install ok installed")
            })
        })
        .cloned()
        .collect()
}

/// Whether `apt-cache policy` reports a candidate newer than what is
/// installed.
pub fn parse_upgrade_available(policy_output: &str) -> bool {
    let field = |name: &str| {
        policy_output
            .lines()
            .map(|l| l.trim())
            .find_map(|l| l.strip_prefix(name))
            .map(|v| v.trim().to_string())
    };
    match (field("Installed:"), field("Candidate:")) {
        (Some(installed), Some(candidate)) => {
            installed != "(none)" && candidate != "(none)" && installed != candidate
        }
        _ => false,
    }
}

/// Quote a string for `sh` if it contains anything beyond a safe set.
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '%' | ':' | '=' | ',' | '+')
    }) {
        return s.to_string();
    }
    let escaped = s.replace('\'', "'\\''");
    format!("'{}'", escaped)
}

// ---------------------------------------------------------------------------
// CommandHost
// ---------------------------------------------------------------------------

/// Production host backend driving hook tools through a `CommandRunner`.
pub struct CommandHost {
    builder: HookCommandBuilder,
    runner: Box<dyn CommandRunner>,
    unit_name: String,
}

impl CommandHost {
    pub fn new(runner: Box<dyn CommandRunner>, unit_name: &str) -> Self {
        CommandHost {
            builder: HookCommandBuilder::new(),
            runner,
            unit_name: unit_name.to_string(),
        }
    }
}

impl HostBackend for CommandHost {
    fn execute_action(&mut self, action: &HostAction) -> Result<(), String> {
        for cmd in self.builder.for_action(action) {
            self.runner.run(&cmd)?;
        }
        Ok(())
    }

    fn local_unit(&self) -> Result<String, String> {
        if self.unit_name.is_empty() {
            return Err("unit name unknown (JUJU_UNIT_NAME not set)".into());
        }
        Ok(self.unit_name.clone())
    }

    fn private_address(&self) -> Result<String, String> {
        let out = self.runner.run(&self.builder.unit_get("private-address"))?;
        Ok(out.trim().to_string())
    }

    fn relation_ids(&self, relation: &str) -> Result<Vec<String>, String> {
        Ok(parse_lines(&self.runner.run(&self.builder.relation_ids(relation))?))
    }

    fn related_units(&self, relation_id: &str) -> Result<Vec<String>, String> {
        Ok(parse_lines(&self.runner.run(&self.builder.relation_list(relation_id))?))
    }

    fn relation_get(&self, relation_id: &str, unit: &str) -> Result<RelationData, String> {
        parse_relation_json(&self.runner.run(&self.builder.relation_get(relation_id, unit))?)
    }

    fn interfaces(&self) -> Result<Vec<InterfaceAddr>, String> {
        Ok(parse_ip_addr_output(&self.runner.run(&self.builder.ip_addr())?))
    }

    fn missing_packages(&self, packages: &[String]) -> Result<Vec<String>, String> {
        if packages.is_empty() {
            return Ok(Vec::new());
        }
        let out = self.runner.run(&self.builder.dpkg_status(packages))?;
        Ok(parse_missing_packages(packages, &out))
    }

    fn upgrade_available(&self, package: &str) -> Result<bool, String> {
        let out = self.runner.run(&self.builder.apt_policy(package))?;
        Ok(parse_upgrade_available(&out))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::runner::MockRunner;
    use serde_json::json;

    #[test]
    fn relation_set_command() {
        let adv = Advertisement::new(Some("amqp:3"))
            .with("username", "neutron")
            .with("vhost", "openstack");
        assert_eq!(
            HookCommandBuilder::new().relation_set(&adv),
            "relation-set -r amqp:3 username=neutron vhost=openstack"
        );
    }

    #[test]
    fn relation_set_quotes_structured_values() {
        let adv = Advertisement::new(None).with("groups", json!({"grp_neutron_vips": "a b"}));
        assert_eq!(
            HookCommandBuilder::new().relation_set(&adv),
            r#"relation-set 'groups={"grp_neutron_vips":"a b"}'"#
        );
    }

    #[test]
    fn install_command() {
        let cmd = HookCommandBuilder::new().apt_install(&["neutron-server".into(), "haproxy".into()]);
        assert!(cmd.ends_with("install neutron-server haproxy"));
        assert!(cmd.contains("--force-confold"));
    }

    #[test]
    fn empty_install_runs_nothing() {
        let cmds = HookCommandBuilder::new().for_action(&HostAction::AptInstall { packages: vec![] });
        assert!(cmds.is_empty());
    }

    #[test]
    fn service_verbs() {
        let b = HookCommandBuilder::new();
        assert_eq!(
            b.for_action(&HostAction::ServiceStop { service: "neutron-server".into() }),
            vec!["service neutron-server stop"]
        );
        assert_eq!(b.open_port(9696), "open-port 9696/TCP");
    }

    #[test]
    fn relation_json_parsing() {
        let data = parse_relation_json(r#"{"password": "pw", "private-address": "10.0.0.3"}"#).unwrap();
        assert_eq!(data.get("password"), Some(&json!("pw")));
        assert!(parse_relation_json("null").unwrap().is_empty());
        assert!(parse_relation_json("").unwrap().is_empty());
        assert!(parse_relation_json("{oops").is_err());
    }

    #[test]
    fn missing_packages_from_dpkg() {
        let pkgs = vec!["neutron-server".to_string(), "haproxy".to_string(), "apache2".to_string()];
        let out = "neutron-server install ok installed\nhaproxy deinstall ok config-files\n";
        assert_eq!(parse_missing_packages(&pkgs, out), vec!["haproxy", "apache2"]);
    }

    #[test]
    fn upgrade_detection() {
        let newer = "neutron-server:\n  Installed: 1:2014.1-0ubuntu1\n  Candidate: 1:2014.2-0ubuntu1\n";
        let same = "neutron-server:\n  Installed: 1:2014.2-0ubuntu1\n  Candidate: 1:2014.2-0ubuntu1\n";
        let none = "neutron-server:\n  Installed: (none)\n  Candidate: 1:2014.2-0ubuntu1\n";
        assert!(parse_upgrade_available(newer));
        assert!(!parse_upgrade_available(same));
        assert!(!parse_upgrade_available(none));
    }

    #[test]
    fn command_host_queries_through_runner() {
        let runner = MockRunner::new()
            .respond_to("relation-ids", Ok("amqp:0\namqp:4\n".into()))
            .respond_to("relation-list", Ok("rabbitmq-server/0\n".into()))
            .respond_to("unit-get", Ok("10.0.0.1\n".into()));
        let host = CommandHost::new(Box::new(runner), "neutron-api/0");
        assert_eq!(host.relation_ids("amqp").unwrap(), vec!["amqp:0", "amqp:4"]);
        assert_eq!(host.related_units("amqp:0").unwrap(), vec!["rabbitmq-server/0"]);
        assert_eq!(host.private_address().unwrap(), "10.0.0.1");
        assert_eq!(host.local_unit().unwrap(), "neutron-api/0");
    }

    #[test]
    fn command_host_propagates_runner_errors() {
        let runner = MockRunner::with_responses(vec![Err("permission denied".into())]);
        let mut host = CommandHost::new(Box::new(runner), "neutron-api/0");
        let err = host
            .execute_action(&HostAction::EnableSite { site: "openstack_https_frontend".into() })
            .unwrap_err();
        assert_eq!(err, "permission denied");
    }

    #[test]
    fn escape_rules() {
        assert_eq!(shell_escape("hello"), "hello");
        assert_eq!(shell_escape("hello world"), "'hello world'");
        assert_eq!(shell_escape("it's"), "'it'\\''s'");
        assert_eq!(shell_escape(""), "''");
    }
}
