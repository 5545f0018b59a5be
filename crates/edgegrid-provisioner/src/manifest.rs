//! Kubernetes objects that make up a provisioned K3S edge cluster.
//!
//! Every object is named `k3s-<edge cluster id>` so it can be found again
//! from the record alone.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, EnvVar, EnvVarSource, Namespace, ObjectFieldSelector,
    PodSpec, PodTemplateSpec, SecurityContext, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Port the K3S API server listens on, in the container and on the Service.
pub const K3S_API_PORT: i32 = 6443;

/// Name of the control-plane container inside the Deployment.
pub const K3S_CONTAINER: &str = "k3s";

/// Environment variable carrying the cluster secret.
pub const CLUSTER_SECRET_ENV: &str = "K3S_TOKEN";

const KUBECONFIG_OUTPUT_ENV: &str = "K3S_KUBECONFIG_OUTPUT";
const KUBECONFIG_OUTPUT_PATH: &str = "/output/kubeconfig.yaml";
const KUBECONFIG_MODE_ENV: &str = "K3S_KUBECONFIG_MODE";
const KUBECONFIG_MODE: &str = "666";
const POD_IP_ENV: &str = "POD_IP";
const OUTPUT_VOLUME: &str = "kubeconfig-output";

pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "edgegrid";

/// Deterministic name of the Deployment and Service for an edge cluster.
pub fn workload_name(edge_cluster_id: &str) -> String {
    format!("k3s-{edge_cluster_id}")
}

/// In-cluster DNS name of the edge cluster's API endpoint.
pub fn service_host(edge_cluster_id: &str, namespace: &str) -> String {
    format!("{}.{namespace}.svc.cluster.local", workload_name(edge_cluster_id))
}

fn selector_labels(edge_cluster_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), K3S_CONTAINER.to_string()),
        (LABEL_INSTANCE.to_string(), edge_cluster_id.to_string()),
    ])
}

fn labels(edge_cluster_id: &str) -> BTreeMap<String, String> {
    let mut labels = selector_labels(edge_cluster_id);
    labels.insert(LABEL_MANAGED_BY.to_string(), MANAGED_BY.to_string());
    labels
}

fn metadata(edge_cluster_id: &str, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(workload_name(edge_cluster_id)),
        namespace: Some(namespace.to_string()),
        labels: Some(labels(edge_cluster_id)),
        ..Default::default()
    }
}

fn env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(LABEL_MANAGED_BY.to_string(), MANAGED_BY.to_string())])),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Single-replica K3S server. The API server advertises the pod IP and
/// accepts the Service DNS name as a TLS SAN.
pub fn deployment(edge_cluster_id: &str, cluster_secret: &str, namespace: &str, image: &str) -> Deployment {
    let pod_ip = EnvVar {
        name: POD_IP_ENV.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: "status.podIP".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    let container = Container {
        name: K3S_CONTAINER.to_string(),
        image: Some(image.to_string()),
        args: Some(vec![
            "server".to_string(),
            format!("--advertise-address=$({POD_IP_ENV})"),
            format!("--tls-san={}", service_host(edge_cluster_id, namespace)),
        ]),
        env: Some(vec![
            pod_ip,
            env(CLUSTER_SECRET_ENV, cluster_secret),
            env(KUBECONFIG_OUTPUT_ENV, KUBECONFIG_OUTPUT_PATH),
            env(KUBECONFIG_MODE_ENV, KUBECONFIG_MODE),
        ]),
        ports: Some(vec![ContainerPort {
            name: Some("https".to_string()),
            container_port: K3S_API_PORT,
            ..Default::default()
        }]),
        security_context: Some(SecurityContext {
            privileged: Some(true),
            ..Default::default()
        }),
        volume_mounts: Some(vec![VolumeMount {
            name: OUTPUT_VOLUME.to_string(),
            mount_path: "/output".to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    Deployment {
        metadata: metadata(edge_cluster_id, namespace),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(selector_labels(edge_cluster_id)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels(edge_cluster_id)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(vec![Volume {
                        name: OUTPUT_VOLUME.to_string(),
                        empty_dir: Some(EmptyDirVolumeSource::default()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// ClusterIP Service exposing the K3S API server.
pub fn service(edge_cluster_id: &str, namespace: &str) -> Service {
    Service {
        metadata: metadata(edge_cluster_id, namespace),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector_labels(edge_cluster_id)),
            ports: Some(vec![ServicePort {
                name: Some("https".to_string()),
                port: K3S_API_PORT,
                target_port: Some(IntOrString::Int(K3S_API_PORT)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn k3s_container_mut(deployment: &mut Deployment) -> Option<&mut Container> {
    deployment
        .spec
        .as_mut()?
        .template
        .spec
        .as_mut()?
        .containers
        .iter_mut()
        .find(|c| c.name == K3S_CONTAINER)
}

/// Set the cluster secret on the K3S container. Returns false if the
/// Deployment has no such container.
pub fn set_cluster_secret(deployment: &mut Deployment, cluster_secret: &str) -> bool {
    let Some(container) = k3s_container_mut(deployment) else {
        return false;
    };
    let vars = container.env.get_or_insert_with(Vec::new);
    match vars.iter_mut().find(|v| v.name == CLUSTER_SECRET_ENV) {
        Some(var) => {
            var.value = Some(cluster_secret.to_string());
            var.value_from = None;
        }
        None => vars.push(env(CLUSTER_SECRET_ENV, cluster_secret)),
    }
    true
}

/// The cluster secret currently carried by a Deployment.
pub fn cluster_secret(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .iter()
        .find(|c| c.name == K3S_CONTAINER)?
        .env
        .as_ref()?
        .iter()
        .find(|v| v.name == CLUSTER_SECRET_ENV)?
        .value
        .as_deref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_shape() {
        let d = deployment("01abc", "token-1", "edge", "rancher/k3s:test");
        assert_eq!(d.metadata.name.as_deref(), Some("k3s-01abc"));
        assert_eq!(d.metadata.namespace.as_deref(), Some("edge"));

        let spec = d.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(1));
        let pod = spec.template.spec.as_ref().unwrap();
        assert_eq!(pod.containers.len(), 1);

        let container = &pod.containers[0];
        assert_eq!(container.image.as_deref(), Some("rancher/k3s:test"));
        let args = container.args.as_ref().unwrap();
        assert_eq!(args[0], "server");
        assert!(args.iter().any(|a| a == "--advertise-address=$(POD_IP)"));
        assert!(args.iter().any(|a| a == "--tls-san=k3s-01abc.edge.svc.cluster.local"));
        assert_eq!(cluster_secret(&d), Some("token-1"));
    }

    #[test]
    fn selector_matches_pod_labels() {
        let d = deployment("01abc", "t", "edge", "img");
        let spec = d.spec.unwrap();
        let selector = spec.selector.match_labels.unwrap();
        let pod_labels = spec.template.metadata.unwrap().labels.unwrap();
        assert!(selector.iter().all(|(k, v)| pod_labels.get(k) == Some(v)));
    }

    #[test]
    fn service_routes_6443() {
        let s = service("01abc", "edge");
        let spec = s.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        let port = &spec.ports.unwrap()[0];
        assert_eq!(port.port, 6443);
        assert_eq!(port.target_port, Some(IntOrString::Int(6443)));
    }

    #[test]
    fn set_cluster_secret_replaces_value() {
        let mut d = deployment("01abc", "old", "edge", "img");
        assert!(set_cluster_secret(&mut d, "new"));
        assert_eq!(cluster_secret(&d), Some("new"));

        let env = &d.spec.unwrap().template.spec.unwrap().containers[0].env.clone().unwrap();
        assert_eq!(env.iter().filter(|v| v.name == CLUSTER_SECRET_ENV).count(), 1);
    }

    #[test]
    fn set_cluster_secret_without_container() {
        let mut d = Deployment::default();
        assert!(!set_cluster_secret(&mut d, "new"));
    }
}
