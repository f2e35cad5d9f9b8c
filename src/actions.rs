//! Action sets, actions, and the binding-suggestion/attachment protocol.
//!
//! The unusual part of OpenXR input is that an action's physical binding
//! depends on which interaction profile the runtime ends up using, so each
//! action carries one binding list per profile plus a profile-independent
//! list keyed by [`xr::Path::NULL`]. Suggestion merges the two; attachment
//! freezes the whole registry for the session.
//!
//! Required call order: [`ActionSet::init`] after the instance exists,
//! [`suggest_bindings`] once per desired profile, [`attach_action_sets`]
//! exactly once per session, then [`ActionSet::create_spaces`]. State
//! queries and haptics are valid only after attachment and a
//! [`sync_action_sets`] call.

use std::fmt;

use openxr as xr;
use thiserror::Error;
use xr::Path;

/// What an action reads from (or writes to) the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Boolean,
    Float,
    Vector2,
    Pose,
    Haptic,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Boolean => "boolean",
            ActionKind::Float => "float",
            ActionKind::Vector2 => "vector2",
            ActionKind::Pose => "pose",
            ActionKind::Haptic => "haptic",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    /// The caller asked about a sub-action path the action was never
    /// declared with. Integration mistake, reported rather than asserted.
    #[error("action `{name}` was not created with subaction path {path:?}")]
    UnknownSubactionPath { name: String, path: Path },
    #[error("action `{name}` is a {actual} action, not {expected}")]
    KindMismatch {
        name: String,
        expected: ActionKind,
        actual: ActionKind,
    },
    #[error("`{0}` has no runtime handle; initialize the owning set first")]
    NotInitialized(String),
    #[error("action `{0}` has no spaces; create them after attaching the set")]
    SpacesNotCreated(String),
    #[error("runtime call failed: {0}")]
    Runtime(#[from] xr::sys::Result),
}

/// Index of an action inside its owning [`ActionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionId(usize);

/// A named, prioritized group of actions. Owns its actions; hand out
/// [`ActionId`]s instead of references so per-frame lookups stay index-based.
pub struct ActionSet {
    name: String,
    localized_name: String,
    priority: u32,
    actions: Vec<Action>,
    handle: Option<xr::ActionSet>,
}

impl ActionSet {
    pub fn new(name: &str, localized_name: &str, priority: u32) -> Self {
        Self {
            name: name.into(),
            localized_name: localized_name.into(),
            priority,
            actions: Vec::new(),
            handle: None,
        }
    }

    /// Declare an action. Names must be unique within the set; the runtime
    /// enforces this at [`ActionSet::init`] time.
    pub fn add_action(
        &mut self,
        name: &str,
        localized_name: &str,
        kind: ActionKind,
        subaction_paths: &[Path],
    ) -> ActionId {
        self.actions
            .push(Action::new(name, localized_name, kind, subaction_paths));
        ActionId(self.actions.len() - 1)
    }

    pub fn action(&self, id: ActionId) -> &Action {
        &self.actions[id.0]
    }

    pub fn action_mut(&mut self, id: ActionId) -> &mut Action {
        &mut self.actions[id.0]
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> Option<&xr::ActionSet> {
        self.handle.as_ref()
    }

    /// Create the runtime handle for the set, then for every action in
    /// declaration order. Stops at the first failure; handles created before
    /// it are kept, so a failed set should be discarded, not retried.
    pub fn init(&mut self, instance: &xr::Instance) -> Result<(), ActionError> {
        let handle =
            instance.create_action_set(&self.name, &self.localized_name, self.priority)?;
        for action in &mut self.actions {
            action.init(&handle)?;
        }
        self.handle = Some(handle);
        Ok(())
    }

    /// Create one action space per sub-action path of every pose action.
    /// Call once per session, after [`attach_action_sets`].
    pub fn create_spaces<G: xr::Graphics>(
        &mut self,
        session: &xr::Session<G>,
    ) -> Result<(), ActionError> {
        for action in &mut self.actions {
            action.create_spaces(session)?;
        }
        Ok(())
    }
}

/// One logical input or output, owned by an [`ActionSet`].
pub struct Action {
    name: String,
    localized_name: String,
    kind: ActionKind,
    subaction_paths: Vec<Path>,
    /// Binding paths per interaction profile; `Path::NULL` holds the
    /// profile-independent list. Declaration order is preserved.
    bindings: Vec<(Path, Vec<Path>)>,
    spaces: Vec<(Path, xr::Space)>,
    runtime: Option<RuntimeAction>,
}

/// Typed runtime handle, created at `init` from the declared kind.
enum RuntimeAction {
    Boolean(xr::Action<bool>),
    Float(xr::Action<f32>),
    Vector2(xr::Action<xr::Vector2f>),
    Pose(xr::Action<xr::Posef>),
    Haptic(xr::Action<xr::Haptic>),
}

impl RuntimeAction {
    fn binding(&self, path: Path) -> xr::Binding<'_> {
        match self {
            RuntimeAction::Boolean(a) => xr::Binding::new(a, path),
            RuntimeAction::Float(a) => xr::Binding::new(a, path),
            RuntimeAction::Vector2(a) => xr::Binding::new(a, path),
            RuntimeAction::Pose(a) => xr::Binding::new(a, path),
            RuntimeAction::Haptic(a) => xr::Binding::new(a, path),
        }
    }
}

impl Action {
    fn new(name: &str, localized_name: &str, kind: ActionKind, subaction_paths: &[Path]) -> Self {
        Self {
            name: name.into(),
            localized_name: localized_name.into(),
            kind,
            subaction_paths: subaction_paths.to_vec(),
            bindings: Vec::new(),
            spaces: Vec::new(),
            runtime: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn subaction_paths(&self) -> &[Path] {
        &self.subaction_paths
    }

    /// Append a binding that applies when `profile` is active. No local
    /// validation; an illegal path surfaces when the suggestion is submitted.
    pub fn add_binding(&mut self, profile: Path, binding: Path) {
        match self.bindings.iter_mut().find(|(p, _)| *p == profile) {
            Some((_, list)) => list.push(binding),
            None => self.bindings.push((profile, vec![binding])),
        }
    }

    /// Append a binding that applies under every suggested profile.
    pub fn add_global_binding(&mut self, binding: Path) {
        self.add_binding(Path::NULL, binding);
    }

    /// Global bindings followed by `profile`-specific ones, in declaration
    /// order. Pure; the same registry yields the same list every call.
    pub fn merged_bindings(&self, profile: Path) -> Vec<Path> {
        let mut out = Vec::new();
        if let Some((_, global)) = self.bindings.iter().find(|(p, _)| *p == Path::NULL) {
            out.extend_from_slice(global);
        }
        if profile != Path::NULL {
            if let Some((_, specific)) = self.bindings.iter().find(|(p, _)| *p == profile) {
                out.extend_from_slice(specific);
            }
        }
        out
    }

    /// The merged bindings as runtime suggestion entries.
    pub fn collect_bindings(&self, profile: Path) -> Result<Vec<xr::Binding<'_>>, ActionError> {
        let runtime = self.runtime()?;
        Ok(self
            .merged_bindings(profile)
            .into_iter()
            .map(|path| runtime.binding(path))
            .collect())
    }

    fn init(&mut self, set: &xr::ActionSet) -> Result<(), ActionError> {
        let paths = &self.subaction_paths;
        let runtime = match self.kind {
            ActionKind::Boolean => RuntimeAction::Boolean(set.create_action::<bool>(
                &self.name,
                &self.localized_name,
                paths,
            )?),
            ActionKind::Float => RuntimeAction::Float(set.create_action::<f32>(
                &self.name,
                &self.localized_name,
                paths,
            )?),
            ActionKind::Vector2 => RuntimeAction::Vector2(set.create_action::<xr::Vector2f>(
                &self.name,
                &self.localized_name,
                paths,
            )?),
            ActionKind::Pose => RuntimeAction::Pose(set.create_action::<xr::Posef>(
                &self.name,
                &self.localized_name,
                paths,
            )?),
            ActionKind::Haptic => RuntimeAction::Haptic(set.create_action::<xr::Haptic>(
                &self.name,
                &self.localized_name,
                paths,
            )?),
        };
        self.runtime = Some(runtime);
        Ok(())
    }

    /// One space per sub-action path, identity offset. Non-pose actions are
    /// skipped. Recreates the table if called again (old spaces are dropped).
    fn create_spaces<G: xr::Graphics>(
        &mut self,
        session: &xr::Session<G>,
    ) -> Result<(), ActionError> {
        let action = match self.runtime()? {
            RuntimeAction::Pose(a) => a.clone(),
            _ => return Ok(()),
        };
        self.spaces.clear();
        let paths = if self.subaction_paths.is_empty() {
            vec![Path::NULL]
        } else {
            self.subaction_paths.clone()
        };
        for path in paths {
            let space = action.create_space(session.clone(), path, xr::Posef::IDENTITY)?;
            self.spaces.push((path, space));
        }
        Ok(())
    }

    /// Locate this action's space for `subaction_path` against `base`.
    pub fn locate_space(
        &self,
        base: &xr::Space,
        time: xr::Time,
        subaction_path: Path,
    ) -> Result<xr::SpaceLocation, ActionError> {
        if self.kind != ActionKind::Pose {
            return Err(self.kind_mismatch(ActionKind::Pose));
        }
        if self.spaces.is_empty() {
            return Err(ActionError::SpacesNotCreated(self.name.clone()));
        }
        let space = self
            .spaces
            .iter()
            .find(|(p, _)| *p == subaction_path)
            .map(|(_, s)| s)
            .ok_or_else(|| self.unknown_subaction(subaction_path))?;
        Ok(space.locate(base, time)?)
    }

    pub fn boolean_state<G: xr::Graphics>(
        &self,
        session: &xr::Session<G>,
        subaction_path: Path,
    ) -> Result<xr::ActionState<bool>, ActionError> {
        self.ensure_subaction(subaction_path)?;
        match self.runtime()? {
            RuntimeAction::Boolean(a) => Ok(a.state(session, subaction_path)?),
            _ => Err(self.kind_mismatch(ActionKind::Boolean)),
        }
    }

    pub fn float_state<G: xr::Graphics>(
        &self,
        session: &xr::Session<G>,
        subaction_path: Path,
    ) -> Result<xr::ActionState<f32>, ActionError> {
        self.ensure_subaction(subaction_path)?;
        match self.runtime()? {
            RuntimeAction::Float(a) => Ok(a.state(session, subaction_path)?),
            _ => Err(self.kind_mismatch(ActionKind::Float)),
        }
    }

    pub fn vector2_state<G: xr::Graphics>(
        &self,
        session: &xr::Session<G>,
        subaction_path: Path,
    ) -> Result<xr::ActionState<xr::Vector2f>, ActionError> {
        self.ensure_subaction(subaction_path)?;
        match self.runtime()? {
            RuntimeAction::Vector2(a) => Ok(a.state(session, subaction_path)?),
            _ => Err(self.kind_mismatch(ActionKind::Vector2)),
        }
    }

    /// Start a vibration. `duration_seconds` is converted to the runtime's
    /// nanosecond unit here.
    pub fn apply_haptic_feedback<G: xr::Graphics>(
        &self,
        session: &xr::Session<G>,
        subaction_path: Path,
        duration_seconds: f32,
        frequency: f32,
        amplitude: f32,
    ) -> Result<(), ActionError> {
        self.ensure_subaction(subaction_path)?;
        match self.runtime()? {
            RuntimeAction::Haptic(a) => {
                let event = xr::HapticVibration::new()
                    .amplitude(amplitude)
                    .frequency(frequency)
                    .duration(duration_from_seconds(duration_seconds));
                a.apply_feedback(session, subaction_path, &event)?;
                Ok(())
            }
            _ => Err(self.kind_mismatch(ActionKind::Haptic)),
        }
    }

    pub fn stop_haptic_feedback<G: xr::Graphics>(
        &self,
        session: &xr::Session<G>,
        subaction_path: Path,
    ) -> Result<(), ActionError> {
        self.ensure_subaction(subaction_path)?;
        match self.runtime()? {
            RuntimeAction::Haptic(a) => {
                a.stop_feedback(session, subaction_path)?;
                Ok(())
            }
            _ => Err(self.kind_mismatch(ActionKind::Haptic)),
        }
    }

    fn runtime(&self) -> Result<&RuntimeAction, ActionError> {
        self.runtime
            .as_ref()
            .ok_or_else(|| ActionError::NotInitialized(self.name.clone()))
    }

    fn ensure_subaction(&self, path: Path) -> Result<(), ActionError> {
        // NULL queries across every sub-action and is always allowed.
        if path == Path::NULL || self.subaction_paths.contains(&path) {
            Ok(())
        } else {
            Err(self.unknown_subaction(path))
        }
    }

    fn unknown_subaction(&self, path: Path) -> ActionError {
        ActionError::UnknownSubactionPath {
            name: self.name.clone(),
            path,
        }
    }

    fn kind_mismatch(&self, expected: ActionKind) -> ActionError {
        ActionError::KindMismatch {
            name: self.name.clone(),
            expected,
            actual: self.kind,
        }
    }
}

/// Submit one suggestion call for `profile` covering every action of every
/// listed set. Profiles with no bindings at all are skipped; the runtime
/// rejects empty suggestions.
pub fn suggest_bindings(
    instance: &xr::Instance,
    profile: Path,
    sets: &[&ActionSet],
) -> Result<(), ActionError> {
    let mut bindings = Vec::new();
    for set in sets {
        for action in set.actions() {
            bindings.extend(action.collect_bindings(profile)?);
        }
    }
    if bindings.is_empty() {
        return Ok(());
    }
    instance.suggest_interaction_profile_bindings(profile, &bindings)?;
    Ok(())
}

/// Attach the sets to the session in one call. After this no further
/// suggestions are accepted for the session.
pub fn attach_action_sets<G: xr::Graphics>(
    session: &xr::Session<G>,
    sets: &[&ActionSet],
) -> Result<(), ActionError> {
    if sets.is_empty() {
        return Ok(());
    }
    let mut handles = Vec::with_capacity(sets.len());
    for set in sets {
        handles.push(
            set.handle()
                .ok_or_else(|| ActionError::NotInitialized(set.name().into()))?,
        );
    }
    session.attach_action_sets(&handles)?;
    Ok(())
}

/// Pump the runtime's input state for the listed sets. Call once per frame
/// before reading action state.
pub fn sync_action_sets<G: xr::Graphics>(
    session: &xr::Session<G>,
    sets: &[&ActionSet],
) -> Result<(), ActionError> {
    let mut active: Vec<xr::ActiveActionSet> = Vec::with_capacity(sets.len());
    for set in sets {
        let handle = set
            .handle()
            .ok_or_else(|| ActionError::NotInitialized(set.name().into()))?;
        active.push(handle.into());
    }
    session.sync_actions(&active)?;
    Ok(())
}

fn duration_from_seconds(seconds: f32) -> xr::Duration {
    xr::Duration::from_nanos((seconds as f64 * 1e9) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: u64) -> Path {
        Path::from_raw(raw)
    }

    #[test]
    fn global_bindings_come_before_profile_bindings() {
        let mut set = ActionSet::new("hands", "Hands", 0);
        let id = set.add_action("grab", "Grab", ActionKind::Boolean, &[path(1), path(2)]);
        let profile = path(100);

        set.action_mut(id).add_binding(profile, path(11));
        set.action_mut(id).add_global_binding(path(10));
        set.action_mut(id).add_binding(profile, path(12));

        assert_eq!(
            set.action(id).merged_bindings(profile),
            vec![path(10), path(11), path(12)]
        );
    }

    #[test]
    fn merged_bindings_ignore_other_profiles() {
        let mut set = ActionSet::new("hands", "Hands", 0);
        let id = set.add_action("grab", "Grab", ActionKind::Boolean, &[]);
        set.action_mut(id).add_global_binding(path(10));
        set.action_mut(id).add_binding(path(100), path(11));
        set.action_mut(id).add_binding(path(200), path(12));

        assert_eq!(
            set.action(id).merged_bindings(path(100)),
            vec![path(10), path(11)]
        );
        assert_eq!(set.action(id).merged_bindings(path(300)), vec![path(10)]);
    }

    #[test]
    fn merged_bindings_are_stable_across_calls() {
        let mut set = ActionSet::new("hands", "Hands", 0);
        let id = set.add_action("pose", "Pose", ActionKind::Pose, &[path(1)]);
        set.action_mut(id).add_global_binding(path(20));
        set.action_mut(id).add_binding(path(100), path(21));

        let first = set.action(id).merged_bindings(path(100));
        let second = set.action(id).merged_bindings(path(100));
        assert_eq!(first, second);
    }

    #[test]
    fn null_profile_collects_only_globals() {
        let mut set = ActionSet::new("hands", "Hands", 0);
        let id = set.add_action("grab", "Grab", ActionKind::Boolean, &[]);
        set.action_mut(id).add_global_binding(path(10));
        set.action_mut(id).add_binding(path(100), path(11));

        assert_eq!(set.action(id).merged_bindings(Path::NULL), vec![path(10)]);
    }

    #[test]
    fn unknown_subaction_path_is_reported_not_panicked() {
        let action = Action::new("grab", "Grab", ActionKind::Boolean, &[path(1), path(2)]);
        assert!(action.ensure_subaction(path(1)).is_ok());
        assert!(action.ensure_subaction(Path::NULL).is_ok());
        match action.ensure_subaction(path(3)) {
            Err(ActionError::UnknownSubactionPath { name, path: p }) => {
                assert_eq!(name, "grab");
                assert_eq!(p, path(3));
            }
            other => panic!("expected UnknownSubactionPath, got {:?}", other.err()),
        }
    }

    #[test]
    fn uninitialized_action_reports_not_initialized() {
        let action = Action::new("grab", "Grab", ActionKind::Boolean, &[]);
        match action.collect_bindings(Path::NULL) {
            Err(ActionError::NotInitialized(name)) => assert_eq!(name, "grab"),
            other => panic!("expected NotInitialized, got {:?}", other.err()),
        }
    }

    #[test]
    fn action_ids_index_in_declaration_order() {
        let mut set = ActionSet::new("hands", "Hands", 0);
        let a = set.add_action("first", "First", ActionKind::Float, &[]);
        let b = set.add_action("second", "Second", ActionKind::Pose, &[path(1)]);

        assert_eq!(set.action(a).name(), "first");
        assert_eq!(set.action(b).name(), "second");
        assert_eq!(set.action(b).kind(), ActionKind::Pose);
        assert_eq!(set.action(b).subaction_paths(), &[path(1)]);
        let names: Vec<_> = set.actions().map(|a| a.name().to_owned()).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn haptic_duration_converts_to_nanoseconds() {
        assert_eq!(duration_from_seconds(3.0).as_nanos(), 3_000_000_000);
        assert_eq!(duration_from_seconds(0.25).as_nanos(), 250_000_000);
        assert_eq!(duration_from_seconds(0.0).as_nanos(), 0);
    }
}
