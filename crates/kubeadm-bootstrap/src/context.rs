//! Values collected by the pipeline and handed to the template.

use std::collections::BTreeMap;

/// Names of the variables every template can rely on.
pub const TEMPLATE_VARIABLES: [&str; 9] = [
    "datacenter",
    "clustername",
    "domainname",
    "nodename",
    "cloudprovider",
    "ipaddress",
    "addresslist",
    "token",
    "number_masters",
];

/// Everything known about the cluster being bootstrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapContext {
    /// Datacenter name.
    pub datacenter: String,
    /// Cluster name (e.g. `k1`).
    pub cluster_name: String,
    /// DNS domain of the cluster nodes.
    pub domain_name: String,
    /// Name of the bootstrap master node.
    pub node_name: String,
    /// Cloud provider tag (`aws` or empty).
    pub cloud_provider: String,
    /// Outbound IP of this node, used as the advertise address.
    pub ip_address: String,
    /// Comma-separated master IPs followed by the service IP.
    pub address_list: String,
    /// Bootstrap token `id.secret`.
    pub token: String,
    /// Number of masters in the cluster.
    pub number_masters: u32,
}

impl BootstrapContext {
    /// Variable map passed to the template renderer. All values are strings.
    pub fn variables(&self) -> BTreeMap<String, String> {
        [
            ("datacenter", self.datacenter.clone()),
            ("clustername", self.cluster_name.clone()),
            ("domainname", self.domain_name.clone()),
            ("nodename", self.node_name.clone()),
            ("cloudprovider", self.cloud_provider.clone()),
            ("ipaddress", self.ip_address.clone()),
            ("addresslist", self.address_list.clone()),
            ("token", self.token.clone()),
            ("number_masters", self.number_masters.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variables_cover_template_contract() {
        let ctx = BootstrapContext {
            datacenter: "dc1".to_string(),
            cluster_name: "k1".to_string(),
            domain_name: "example.com".to_string(),
            node_name: "node1.example.com".to_string(),
            cloud_provider: String::new(),
            ip_address: "10.0.0.10".to_string(),
            address_list: "10.0.0.1,10.96.0.1".to_string(),
            token: "abcdef.0123456789abcdef".to_string(),
            number_masters: 1,
        };

        let vars = ctx.variables();
        let keys: Vec<&str> = vars.keys().map(String::as_str).collect();
        let mut expected = TEMPLATE_VARIABLES.to_vec();
        expected.sort_unstable();
        assert_eq!(keys, expected);
        assert_eq!(vars["number_masters"], "1");
        assert_eq!(vars["cloudprovider"], "");
    }
}
