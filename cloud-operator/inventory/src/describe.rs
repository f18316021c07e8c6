use crate::Inventory;
use std::fmt::{self, Write};

impl Inventory {
    /// Renders the graph as an indented, human-readable listing.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        // Writing to a String never fails.
        let _ = self.write_description(&mut out);
        out
    }

    fn write_description(&self, out: &mut String) -> fmt::Result {
        for network in self.networks() {
            writeln!(out, "network {}", network.id)?;
            for subnet in &network.subnets {
                let subnet = self.subnet(*subnet);
                writeln!(
                    out,
                    "  subnet {} {} ({} instances)",
                    subnet.id,
                    subnet.cidr,
                    subnet.instances.len()
                )?;
            }
            for cluster in &network.clusters {
                let cluster = self.cluster(*cluster);
                writeln!(
                    out,
                    "  cluster {} [{}] endpoint={}",
                    cluster.name,
                    cluster.status,
                    cluster.endpoint.as_deref().unwrap_or("-")
                )?;
                for role in &cluster.roles {
                    writeln!(out, "    role {}", self.role(*role).name)?;
                }
                for instance in &cluster.instances {
                    writeln!(out, "    instance {}", self.instance(*instance).id)?;
                }
            }
            for instance in &network.instances {
                let instance = self.instance(*instance);
                if instance.cluster.is_none() {
                    writeln!(out, "  instance {}", instance.id)?;
                }
            }
        }

        for role in self.roles() {
            writeln!(
                out,
                "role {} compute={} cluster={} clusters={}",
                role.name,
                role.compute_instances.len(),
                role.cluster_instances.len(),
                role.clusters
                    .iter()
                    .map(|c| self.cluster(*c).name.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            )?;
        }

        Ok(())
    }
}
