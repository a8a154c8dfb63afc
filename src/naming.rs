//! App name generation and the deterministic identity derivations
//!
//! Everything the rest of the system knows about an app is derived from its
//! name: the container name, the public URLs, and the routing labels the
//! reverse proxy reads. The derivations live here so the contract stays in
//! one place.

use rand::Rng;
use std::collections::BTreeMap;

/// Prefix for every app container name
pub const CONTAINER_PREFIX: &str = "user-app-";

const ADJECTIVES: [&str; 10] = [
    "bright", "cold", "dark", "great", "high", "little", "new", "old", "shiny", "young",
];

const NOUNS: [&str; 10] = [
    "river", "sea", "sky", "sun", "moon", "star", "tree", "wind", "fire", "snow",
];

/// Generate a random app name of the form `<adjective>-<noun>-<3-digit>`.
///
/// The space is 10 x 10 x 900 = 90,000 combinations. No uniqueness check
/// happens here; the create path retries on a directory collision.
pub fn generate_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    format!("{}-{}-{}", adjective, noun, rng.gen_range(100..1000))
}

/// Container name for an app
pub fn container_name(app_name: &str) -> String {
    format!("{}{}", CONTAINER_PREFIX, app_name)
}

/// App name a container name belongs to, if it is one of ours.
///
/// Accepts the leading `/` the runtime prefixes to names in list responses.
pub fn app_for_container(container_name: &str) -> Option<&str> {
    container_name
        .trim_start_matches('/')
        .strip_prefix(CONTAINER_PREFIX)
}

/// Plaintext URL an app is reachable at
pub fn app_url(app_name: &str, base_domain: &str) -> String {
    format!("http://{}.{}", app_name, base_domain)
}

/// TLS URL an app is reachable at
pub fn app_https_url(app_name: &str, base_domain: &str) -> String {
    format!("https://{}.{}", app_name, base_domain)
}

/// Build the routing labels for an app container.
///
/// This map is the entire integration surface with the reverse proxy: an
/// enable flag, an HTTP router on the `web` entrypoint, an HTTPS router on
/// `websecure` with a certificate resolver, the backend port, and the
/// network the proxy reaches the container over.
pub fn routing_labels(
    app_name: &str,
    base_domain: &str,
    port: u16,
    network: &str,
) -> BTreeMap<String, String> {
    let rule = format!("Host(`{}.{}`)", app_name, base_domain);
    let mut labels = BTreeMap::new();

    labels.insert("traefik.enable".to_string(), "true".to_string());
    labels.insert("traefik.docker.network".to_string(), network.to_string());

    labels.insert(
        format!("traefik.http.routers.{}.rule", app_name),
        rule.clone(),
    );
    labels.insert(
        format!("traefik.http.routers.{}.entrypoints", app_name),
        "web".to_string(),
    );
    labels.insert(
        format!("traefik.http.services.{}.loadbalancer.server.port", app_name),
        port.to_string(),
    );

    labels.insert(
        format!("traefik.http.routers.{}-secure.rule", app_name),
        rule,
    );
    labels.insert(
        format!("traefik.http.routers.{}-secure.entrypoints", app_name),
        "websecure".to_string(),
    );
    labels.insert(
        format!("traefik.http.routers.{}-secure.tls.certresolver", app_name),
        "myresolver".to_string(),
    );
    labels.insert(
        format!(
            "traefik.http.services.{}-secure.loadbalancer.server.port",
            app_name
        ),
        port.to_string(),
    );

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_generated_name(name: &str) -> bool {
        let parts: Vec<&str> = name.split('-').collect();
        parts.len() == 3
            && ADJECTIVES.contains(&parts[0])
            && NOUNS.contains(&parts[1])
            && parts[2].len() == 3
            && parts[2].chars().all(|c| c.is_ascii_digit())
            && !parts[2].starts_with('0')
    }

    #[test]
    fn test_generated_name_shape() {
        for _ in 0..200 {
            let name = generate_name();
            assert!(is_generated_name(&name), "bad name: {}", name);
        }
    }

    #[test]
    fn test_container_name_round_trip() {
        assert_eq!(container_name("bright-sea-123"), "user-app-bright-sea-123");
        assert_eq!(
            app_for_container("user-app-bright-sea-123"),
            Some("bright-sea-123")
        );
        // list responses prefix names with a slash
        assert_eq!(
            app_for_container("/user-app-bright-sea-123"),
            Some("bright-sea-123")
        );
        assert_eq!(app_for_container("traefik"), None);
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            app_url("cold-moon-451", "example.com"),
            "http://cold-moon-451.example.com"
        );
        assert_eq!(
            app_https_url("cold-moon-451", "example.com"),
            "https://cold-moon-451.example.com"
        );
    }

    #[test]
    fn test_routing_labels_contract() {
        let labels = routing_labels("cold-moon-451", "example.com", 5000, "paw-web-network");

        assert_eq!(labels["traefik.enable"], "true");
        assert_eq!(labels["traefik.docker.network"], "paw-web-network");
        assert_eq!(
            labels["traefik.http.routers.cold-moon-451.rule"],
            "Host(`cold-moon-451.example.com`)"
        );
        assert_eq!(
            labels["traefik.http.routers.cold-moon-451.entrypoints"],
            "web"
        );
        assert_eq!(
            labels["traefik.http.routers.cold-moon-451-secure.rule"],
            "Host(`cold-moon-451.example.com`)"
        );
        assert_eq!(
            labels["traefik.http.routers.cold-moon-451-secure.entrypoints"],
            "websecure"
        );
        assert_eq!(
            labels["traefik.http.routers.cold-moon-451-secure.tls.certresolver"],
            "myresolver"
        );
        assert_eq!(
            labels["traefik.http.services.cold-moon-451.loadbalancer.server.port"],
            "5000"
        );
        assert_eq!(
            labels["traefik.http.services.cold-moon-451-secure.loadbalancer.server.port"],
            "5000"
        );
        assert_eq!(labels.len(), 9);
    }
}
