use log::debug;
use uuid::Uuid;

use super::fixture::{Channel, ChannelPatch, ChannelType, Fixture};
use super::scene::{ActionPatch, Scene, SceneAction};
use super::Project;

/// Snapshots beyond this are dropped, oldest first.
pub const HISTORY_LIMIT: usize = 50;

/// `ADD_FIXTURE` payload: id and channels are generated by the reducer.
#[derive(Clone, Debug)]
pub struct NewFixture {
    pub name: String,
    pub start_address: u16,
    pub channel_count: u16,
}

/// Every intent that can mutate the project document, plus the history
/// controls themselves.
#[derive(Clone, Debug)]
pub enum ProjectAction {
    LoadProject(Project),
    Undo,
    Redo,
    MarkSaved,
    AddFixture(NewFixture),
    UpdateFixture(Fixture),
    DeleteFixture(String),
    AddChannel {
        fixture_id: String,
        channel: Channel,
    },
    UpdateChannel {
        channel_id: String,
        patch: ChannelPatch,
    },
    DeleteChannel {
        fixture_id: String,
        channel_id: String,
    },
    AddScene,
    UpdateScene(Scene),
    DeleteScene(String),
    AddAction {
        scene_id: String,
        action: SceneAction,
    },
    UpdateAction {
        scene_id: String,
        action_id: String,
        patch: ActionPatch,
    },
    DeleteAction {
        scene_id: String,
        action_id: String,
    },
}

/// The project document wrapped with a bounded, branch-discarding undo/redo
/// history and a dirty flag.
#[derive(Clone, Debug, Default)]
pub struct ProjectHistory {
    past: Vec<Project>,
    present: Project,
    /// Front entry is the most recently undone snapshot
    future: Vec<Project>,
    dirty: bool,
}

impl ProjectHistory {
    pub fn new(present: Project) -> ProjectHistory {
        ProjectHistory {
            past: Vec::new(),
            present,
            future: Vec::new(),
            dirty: false,
        }
    }

    pub fn present(&self) -> &Project {
        &self.present
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// The single mutation entry point. Document-mutating actions push the
    /// pre-mutation snapshot and clear the redo branch; no-ops leave the
    /// whole state untouched.
    pub fn dispatch(&mut self, action: ProjectAction) {
        match action {
            ProjectAction::LoadProject(project) => {
                self.present = project;
                self.past.clear();
                self.future.clear();
                self.dirty = false;
            }
            ProjectAction::Undo => {
                if let Some(previous) = self.past.pop() {
                    let current = std::mem::replace(&mut self.present, previous);
                    self.future.insert(0, current);
                    self.dirty = true;
                }
            }
            ProjectAction::Redo => {
                if !self.future.is_empty() {
                    let next = self.future.remove(0);
                    let current = std::mem::replace(&mut self.present, next);
                    self.past.push(current);
                    self.dirty = true;
                }
            }
            ProjectAction::MarkSaved => self.dirty = false,
            other => {
                if let Some(next) = reduce_document(&self.present, &other) {
                    let current = std::mem::replace(&mut self.present, next);
                    self.past.push(current);
                    if self.past.len() > HISTORY_LIMIT {
                        self.past.remove(0);
                    }
                    self.future.clear();
                    self.dirty = true;
                } else {
                    debug!("Project action {:?} was a no-op; history untouched", other);
                }
            }
        }
    }
}

/// Pure document reducer; `None` means the action changed nothing.
fn reduce_document(project: &Project, action: &ProjectAction) -> Option<Project> {
    reduce_fixtures(project, action).or_else(|| reduce_scenes(project, action))
}

fn reduce_fixtures(project: &Project, action: &ProjectAction) -> Option<Project> {
    match action {
        ProjectAction::AddFixture(fixture) => {
            let channels = (0..fixture.channel_count)
                .map(|number| Channel {
                    id: Uuid::new_v4().to_string(),
                    number,
                    channel_type: ChannelType::Raw,
                    default_value: 0,
                })
                .collect();
            let mut next = project.clone();
            next.fixtures.push(Fixture {
                id: Uuid::new_v4().to_string(),
                name: fixture.name.clone(),
                start_address: fixture.start_address,
                channel_count: fixture.channel_count,
                channels,
            });
            Some(next)
        }
        ProjectAction::UpdateFixture(fixture) => {
            let index = project.fixtures.iter().position(|f| f.id == fixture.id)?;
            let mut next = project.clone();
            next.fixtures[index] = fixture.clone();
            Some(next)
        }
        ProjectAction::DeleteFixture(id) => {
            if !project.fixtures.iter().any(|f| f.id == *id) {
                return None;
            }
            let mut next = project.clone();
            next.fixtures.retain(|f| f.id != *id);
            Some(next)
        }
        ProjectAction::AddChannel {
            fixture_id,
            channel,
        } => {
            let index = project.fixtures.iter().position(|f| f.id == *fixture_id)?;
            let mut next = project.clone();
            next.fixtures[index].channels.push(channel.clone());
            Some(next)
        }
        ProjectAction::UpdateChannel { channel_id, patch } => {
            let mut next = project.clone();
            let mut touched = false;
            for fixture in next.fixtures.iter_mut() {
                for channel in fixture.channels.iter_mut() {
                    if channel.id == *channel_id {
                        patch.apply(channel);
                        touched = true;
                    }
                }
            }
            touched.then_some(next)
        }
        ProjectAction::DeleteChannel {
            fixture_id,
            channel_id,
        } => {
            let index = project.fixtures.iter().position(|f| f.id == *fixture_id)?;
            if !project.fixtures[index]
                .channels
                .iter()
                .any(|c| c.id == *channel_id)
            {
                return None;
            }
            let mut next = project.clone();
            next.fixtures[index].channels.retain(|c| c.id != *channel_id);
            Some(next)
        }
        _ => None,
    }
}

fn reduce_scenes(project: &Project, action: &ProjectAction) -> Option<Project> {
    match action {
        ProjectAction::AddScene => {
            let order = project.scenes.iter().map(|s| s.order).max().map_or(0, |m| m + 1);
            let mut next = project.clone();
            next.scenes.push(Scene::new(order));
            Some(next)
        }
        ProjectAction::UpdateScene(scene) => {
            let index = project.scenes.iter().position(|s| s.id == scene.id)?;
            let mut next = project.clone();
            // Order is only ever changed by add/delete, never a direct edit
            let order = next.scenes[index].order;
            next.scenes[index] = scene.clone();
            next.scenes[index].order = order;
            Some(next)
        }
        ProjectAction::DeleteScene(id) => {
            if !project.scenes.iter().any(|s| s.id == *id) {
                return None;
            }
            let mut next = project.clone();
            next.scenes.retain(|s| s.id != *id);
            for (index, scene) in next.scenes.iter_mut().enumerate() {
                scene.order = index as u32;
            }
            Some(next)
        }
        ProjectAction::AddAction { scene_id, action } => {
            let index = project.scenes.iter().position(|s| s.id == *scene_id)?;
            let mut next = project.clone();
            next.scenes[index].actions.push(action.clone());
            Some(next)
        }
        ProjectAction::UpdateAction {
            scene_id,
            action_id,
            patch,
        } => {
            let scene_index = project.scenes.iter().position(|s| s.id == *scene_id)?;
            let action_index = project.scenes[scene_index]
                .actions
                .iter()
                .position(|a| a.id == *action_id)?;
            let mut next = project.clone();
            patch.apply(&mut next.scenes[scene_index].actions[action_index]);
            Some(next)
        }
        ProjectAction::DeleteAction {
            scene_id,
            action_id,
        } => {
            let index = project.scenes.iter().position(|s| s.id == *scene_id)?;
            if !project.scenes[index].actions.iter().any(|a| a.id == *action_id) {
                return None;
            }
            let mut next = project.clone();
            next.scenes[index].actions.retain(|a| a.id != *action_id);
            Some(next)
        }
        _ => None,
    }
}
