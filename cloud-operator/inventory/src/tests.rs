use super::*;
use crate::discovery::{
    ClusterRecord, InstanceRecord, NetworkRecord, NodeGroupRecord, SubnetRecord,
};
use maplit::{btreemap, convert_args};

const LINK_KEY: &str = "eks:cluster-name";

fn snapshot() -> Snapshot {
    Snapshot {
        cluster_link_key: Some(LINK_KEY.to_string()),
        networks: vec![NetworkRecord {
            id: "N1".to_string(),
        }],
        subnets: vec![SubnetRecord {
            id: "S1".to_string(),
            network_id: "N1".to_string(),
            cidr: "10.0.0.0/24".to_string(),
        }],
        clusters: vec![ClusterRecord {
            name: "C1".to_string(),
            status: "running".to_string(),
            network_id: "N1".to_string(),
            endpoint: Some("C1.example.com".to_string()),
            ca_data: None,
            cidr: None,
            tags: Tags::new(),
        }],
        node_groups: convert_args!(btreemap!(
            "C1" => vec![NodeGroupRecord {
                name: "ng-1".to_string(),
                role: Some("arn:aws:iam::1:role/R1".to_string()),
            }],
        )),
        instances: vec![InstanceRecord {
            id: "I1".to_string(),
            network_id: "N1".to_string(),
            subnet_id: Some("S1".to_string()),
            role: Some("arn:aws:iam::1:role/R1".to_string()),
            tags: convert_args!(btreemap!(LINK_KEY => "C1")),
        }],
    }
}

fn instance(id: &str, role: Option<&str>, cluster: Option<&str>) -> InstanceRecord {
    InstanceRecord {
        id: id.to_string(),
        network_id: "N1".to_string(),
        subnet_id: Some("S1".to_string()),
        role: role.map(Into::into),
        tags: cluster
            .map(|c| convert_args!(btreemap!(LINK_KEY => c)))
            .unwrap_or_default(),
    }
}

#[tokio::test]
async fn links_cluster_members() {
    let inventory = Inventory::discover(&snapshot()).await.expect("must build");

    assert_eq!(inventory.networks().len(), 1);
    let network = &inventory.networks()[0];
    assert_eq!(network.subnets.len(), 1);
    assert_eq!(network.clusters.len(), 1);
    assert_eq!(network.instances.len(), 1);

    let c1 = inventory.cluster_by_name("C1").expect("cluster must exist");
    let cluster = inventory.cluster(c1);
    assert!(cluster.status.is_ready());
    assert_eq!(cluster.instances.len(), 1);
    assert_eq!(cluster.roles.len(), 1, "node group and instance share a role");

    let r1 = inventory.role_by_name("R1").expect("role must exist");
    let role = inventory.role(r1);
    assert_eq!(role.clusters, vec![c1]);
    assert_eq!(role.cluster_instances.len(), 1);
    assert!(role.compute_instances.is_empty());

    let i1 = inventory.instance(cluster.instances[0]);
    assert_eq!(i1.id, "I1");
    assert_eq!(i1.cluster, Some(c1));
    assert_eq!(i1.role, Some(r1));
    assert_eq!(inventory.subnet(i1.subnet.unwrap()).instances.len(), 1);
}

#[tokio::test]
async fn dangling_network_reference() {
    let mut snapshot = snapshot();
    snapshot.clusters[0].network_id = "N2".to_string();

    let error = Inventory::discover(&snapshot).await.unwrap_err();
    assert!(
        matches!(
            &error,
            Error::MissingNetwork { kind: "cluster", id, network } if id == "C1" && network == "N2"
        ),
        "{error}"
    );

    let mut snapshot = self::snapshot();
    snapshot.instances[0].network_id = "N9".to_string();
    assert!(matches!(
        Inventory::discover(&snapshot).await,
        Err(Error::MissingNetwork {
            kind: "instance",
            ..
        })
    ));

    let mut snapshot = self::snapshot();
    snapshot.subnets[0].network_id = "N9".to_string();
    assert!(matches!(
        Inventory::discover(&snapshot).await,
        Err(Error::MissingNetwork { kind: "subnet", .. })
    ));
}

#[tokio::test]
async fn invalid_subnet_cidr() {
    let mut snapshot = snapshot();
    snapshot.subnets[0].cidr = "10.0.0.0/33".to_string();
    let inventory = Inventory::discover(&snapshot)
        .await
        .expect("a malformed range must not prevent the build");

    let subnet = &inventory.subnets()[0];
    assert_eq!(subnet.cidr, "10.0.0.0/33");
    assert!(matches!(
        subnet.parse_cidr(),
        Err(cloud_operator_core::Error::InvalidCidr { ref value, .. }) if value == "10.0.0.0/33"
    ));

    let c1 = inventory.cluster_by_name("C1").unwrap();
    assert!(inventory.cluster_cidrs(c1).is_err());
    assert_eq!(inventory.cluster(c1).instances.len(), 1);
}

#[tokio::test]
async fn duplicate_cluster_names_resolve_to_the_first() {
    let mut snapshot = snapshot();
    let mut duplicate = snapshot.clusters[0].clone();
    duplicate.endpoint = Some("https://other.example.com".to_string());
    snapshot.clusters.push(duplicate);
    let inventory = Inventory::discover(&snapshot).await.expect("must build");

    assert_eq!(inventory.clusters().len(), 2);
    let c1 = inventory.cluster_by_name("C1").unwrap();
    assert_eq!(inventory.clusters()[0].name, inventory.cluster(c1).name);
    assert_eq!(
        inventory.cluster(c1).endpoint.as_deref(),
        snapshot.clusters[0].endpoint.as_deref()
    );
    assert_eq!(inventory.cluster(c1).instances.len(), 1);
    assert!(inventory.clusters()[1].instances.is_empty());
}

#[tokio::test]
async fn discovery_errors_surface() {
    struct Failing;

    #[async_trait::async_trait]
    impl Discovery for Failing {
        fn cluster_link_key(&self) -> &str {
            LINK_KEY
        }

        async fn networks(&self) -> Result<Vec<NetworkRecord>, DiscoveryError> {
            Ok(vec![])
        }

        async fn subnets(&self) -> Result<Vec<SubnetRecord>, DiscoveryError> {
            Err(DiscoveryError::transient("DescribeSubnets", "throttled"))
        }

        async fn clusters(&self) -> Result<Vec<ClusterRecord>, DiscoveryError> {
            unreachable!("discovery must stop at the first failure")
        }

        async fn node_groups(&self, _: &str) -> Result<Vec<NodeGroupRecord>, DiscoveryError> {
            unreachable!("discovery must stop at the first failure")
        }

        async fn instances(&self) -> Result<Vec<InstanceRecord>, DiscoveryError> {
            unreachable!("discovery must stop at the first failure")
        }
    }

    match Inventory::discover(&Failing).await {
        Err(Error::Discovery(error)) => {
            assert_eq!(error.operation, "DescribeSubnets");
            assert!(error.transient);
        }
        res => panic!("unexpected result: {res:?}"),
    }
}

#[tokio::test]
async fn role_partition() {
    let mut snapshot = snapshot();
    snapshot.instances.extend([
        instance("I2", Some("R1"), None),
        instance("I3", Some("role/R2"), None),
        instance("I4", Some("R2"), Some("C1")),
        // Unknown clusters leave the instance unlinked.
        instance("I5", Some("R2"), Some("C9")),
        instance("I6", None, None),
    ]);
    let inventory = Inventory::discover(&snapshot).await.expect("must build");

    for role in inventory.roles() {
        for id in &role.compute_instances {
            assert!(!role.cluster_instances.contains(id));
            assert_eq!(inventory.instance(*id).cluster, None);
        }
        for id in &role.cluster_instances {
            assert!(inventory.instance(*id).cluster.is_some());
        }
    }

    for (idx, instance) in inventory.instances().iter().enumerate() {
        let id = InstanceId(idx);
        match instance.role {
            Some(role) => {
                let role = inventory.role(role);
                let sets = role.compute_instances.contains(&id) as usize
                    + role.cluster_instances.contains(&id) as usize;
                assert_eq!(sets, 1, "{} must be in exactly one set", instance.id);
            }
            None => assert_eq!(instance.id, "I6"),
        }
    }

    let r1 = inventory.role(inventory.role_by_name("R1").unwrap());
    assert_eq!(r1.compute_instances.len(), 1);
    assert_eq!(r1.cluster_instances.len(), 1);

    let r2 = inventory.role(inventory.role_by_name("R2").unwrap());
    assert_eq!(r2.compute_instances.len(), 2);
    assert_eq!(r2.cluster_instances.len(), 1);

    let c1 = inventory.cluster(inventory.cluster_by_name("C1").unwrap());
    assert_eq!(c1.roles.len(), 2);
    assert_eq!(c1.instances.len(), 2);
}

#[tokio::test]
async fn roles_are_not_duplicated() {
    let mut snapshot = snapshot();
    snapshot.node_groups.insert(
        "C1".to_string(),
        vec![
            NodeGroupRecord {
                name: "ng-1".to_string(),
                role: Some("arn:aws:iam::1:role/R1".to_string()),
            },
            NodeGroupRecord {
                name: "ng-2".to_string(),
                role: Some("R1".to_string()),
            },
            NodeGroupRecord {
                name: "ng-3".to_string(),
                role: None,
            },
        ],
    );
    let inventory = Inventory::discover(&snapshot).await.expect("must build");
    assert_eq!(inventory.roles().len(), 1);
    assert_eq!(inventory.clusters()[0].roles.len(), 1);
    assert_eq!(inventory.roles()[0].clusters.len(), 1);
}

#[tokio::test]
async fn cluster_cidrs() {
    let mut snapshot = snapshot();
    snapshot.subnets.push(SubnetRecord {
        id: "S2".to_string(),
        network_id: "N1".to_string(),
        cidr: "10.0.1.0/24".to_string(),
    });
    snapshot.clusters.push(ClusterRecord {
        name: "C2".to_string(),
        status: "RUNNING".to_string(),
        network_id: "N1".to_string(),
        endpoint: Some("https://34.1.2.3".to_string()),
        ca_data: None,
        cidr: Some("10.8.0.0/14".to_string()),
        tags: Tags::new(),
    });
    let inventory = Inventory::discover(&snapshot).await.expect("must build");

    let c1 = inventory.cluster_by_name("C1").unwrap();
    assert_eq!(
        inventory.cluster_cidrs(c1).unwrap(),
        vec![
            "10.0.0.0/24".parse::<IpNet>().unwrap(),
            "10.0.1.0/24".parse().unwrap()
        ]
    );

    let c2 = inventory.cluster_by_name("C2").unwrap();
    assert_eq!(
        inventory.cluster_cidrs(c2).unwrap(),
        vec!["10.8.0.0/14".parse::<IpNet>().unwrap()]
    );
    assert_eq!(
        inventory.cluster(c2).api_url().as_deref(),
        Some("https://34.1.2.3")
    );
    assert_eq!(
        inventory.cluster(c1).api_url().as_deref(),
        Some("https://C1.example.com")
    );
}

#[test]
fn cluster_status() {
    assert!(ClusterStatus::new("ACTIVE").is_ready());
    assert!(ClusterStatus::new("Running").is_ready());
    assert!(!ClusterStatus::new("provisioning").is_ready());
    assert!(!ClusterStatus::new("").is_ready());
}

#[test]
fn role_names() {
    assert_eq!(IdentityRole::name_from_ref("arn:aws:iam::1:role/R1"), "R1");
    assert_eq!(
        IdentityRole::name_from_ref("arn:aws:iam::1:role/path/to/R1"),
        "R1"
    );
    assert_eq!(IdentityRole::name_from_ref("R1"), "R1");
}

#[test]
fn describe() {
    let records = Records {
        networks: snapshot().networks,
        subnets: snapshot().subnets,
        clusters: vec![(
            snapshot().clusters[0].clone(),
            snapshot().node_groups["C1"].clone(),
        )],
        instances: vec![instance("I2", Some("R3"), None)],
    };
    let inventory = Inventory::build(records, LINK_KEY).expect("must build");
    let description = inventory.describe();
    assert!(description.contains("network N1"), "{description}");
    assert!(description.contains("subnet S1 10.0.0.0/24"), "{description}");
    assert!(description.contains("cluster C1 [running]"), "{description}");
    assert!(description.contains("  instance I2"), "{description}");
    assert!(
        description.contains("role R1 compute=0 cluster=0 clusters=C1"),
        "{description}"
    );
}

#[test]
fn snapshot_json() {
    let snapshot: Snapshot = serde_json::from_str(
        r#"{
            "networks": [{ "id": "vpc-1" }],
            "clusters": [{ "name": "c1", "status": "ACTIVE", "networkId": "vpc-1" }],
            "nodeGroups": { "c1": [{ "name": "ng-1", "role": "arn:aws:iam::1:role/R1" }] }
        }"#,
    )
    .expect("must parse");
    assert_eq!(snapshot.clusters[0].endpoint, None);
    assert_eq!(snapshot.cluster_link_key(), LINK_KEY);

    let gcp = snapshot.with_provider_defaults(cloud_operator_core::Provider::Gcp);
    assert_eq!(gcp.cluster_link_key(), "goog-gke-node");
}
