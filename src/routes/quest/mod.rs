mod handler;
pub(crate) mod model;

pub use handler::{
    active_quests, complete_step, join_quest, list_quests, progress, progress_for_quest,
    quests_for_city, quit_quest,
};
