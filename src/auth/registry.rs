use crate::auth::{AuthError, FormLogin, LoginRoutine, SessionState};
use crate::config::Config;
use std::collections::HashMap;
use std::sync::Arc;

/// `site_id` → ordered session states
///
/// Populated from the configuration file; custom routines are added with
/// [`AuthRegistry::register`] before the orchestrator is built.
#[derive(Debug, Clone, Default)]
pub struct AuthRegistry {
    states: HashMap<u32, Vec<SessionState>>,
}

impl AuthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from every `[[site.state]]` table
    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let mut registry = Self::new();
        for site in &config.sites {
            for entry in &site.states {
                let routine: Arc<dyn LoginRoutine> = Arc::new(FormLogin::from_entry(entry));
                registry.register(site.id, SessionState::new(entry.label.clone(), routine)?);
            }
        }
        Ok(registry)
    }

    /// Appends a state to the site's list
    pub fn register(&mut self, site_id: u32, state: SessionState) {
        self.states.entry(site_id).or_default().push(state);
    }

    pub fn states_for(&self, site_id: u32) -> &[SessionState] {
        self.states.get(&site_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Picks the state to crawl with
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The site has no states; crawl anonymously
    /// * `Ok(Some(state))` - The state named `label`, or the first one
    /// * `Err(AuthError::UnknownState)` - `label` names no state of the site
    pub fn select(
        &self,
        site_id: u32,
        label: Option<&str>,
    ) -> Result<Option<SessionState>, AuthError> {
        let states = self.states_for(site_id);
        match label {
            None => Ok(states.first().cloned()),
            Some(wanted) => states
                .iter()
                .find(|s| s.label() == wanted)
                .cloned()
                .map(Some)
                .ok_or_else(|| AuthError::UnknownState {
                    site_id,
                    label: wanted.to_string(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoginStep, SiteEntry, StateEntry};

    fn config_with_states(labels: &[&str]) -> Config {
        let mut config = Config::default();
        config.sites = vec![SiteEntry {
            id: 4,
            name: "demo".to_string(),
            seed_url: "https://demo.test/".to_string(),
            origin: None,
            requires_auth: true,
            states: labels
                .iter()
                .map(|label| StateEntry {
                    label: label.to_string(),
                    login_url: "https://demo.test/login".to_string(),
                    settle: 0,
                    steps: vec![LoginStep::Click {
                        selector: "#go".to_string(),
                    }],
                })
                .collect(),
        }];
        config
    }

    #[test]
    fn test_from_config_keeps_order() {
        let registry = AuthRegistry::from_config(&config_with_states(&["User1", "Admin"])).unwrap();
        let labels: Vec<&str> = registry.states_for(4).iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["User1", "Admin"]);
        assert!(registry.states_for(5).is_empty());
    }

    #[test]
    fn test_select_defaults_to_first() {
        let registry = AuthRegistry::from_config(&config_with_states(&["User1", "Admin"])).unwrap();
        let state = registry.select(4, None).unwrap().unwrap();
        assert_eq!(state.label(), "User1");

        let state = registry.select(4, Some("Admin")).unwrap().unwrap();
        assert_eq!(state.label(), "Admin");
    }

    #[test]
    fn test_select_unknown_label() {
        let registry = AuthRegistry::from_config(&config_with_states(&["User1"])).unwrap();
        assert!(matches!(
            registry.select(4, Some("Nobody")),
            Err(AuthError::UnknownState { site_id: 4, .. })
        ));
    }

    #[test]
    fn test_select_without_states_is_anonymous() {
        let registry = AuthRegistry::new();
        assert!(registry.select(9, None).unwrap().is_none());
    }

    #[test]
    fn test_invalid_label_from_config() {
        let result = AuthRegistry::from_config(&config_with_states(&["bad_label"]));
        assert!(matches!(result, Err(AuthError::InvalidLabel(_))));
    }
}
