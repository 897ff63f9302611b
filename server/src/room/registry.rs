use std::{collections::HashMap, sync::Arc};

use comms::types::{Task, User};
use tokio::sync::Mutex;

use super::estimation_room::EstimationRoom;

/// All the rooms the server currently hosts, created on demand by clients
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, Arc<Mutex<EstimationRoom>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        RoomRegistry {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Create a room with the given creator and backlog, erroring when the id is taken
    pub async fn create_room(
        &self,
        room_id: &str,
        creator: User,
        tasks: Vec<Task>,
    ) -> anyhow::Result<Arc<Mutex<EstimationRoom>>> {
        let mut rooms = self.rooms.lock().await;

        if rooms.contains_key(room_id) {
            return Err(anyhow::anyhow!("room '{}' already exists", room_id));
        }

        let room = Arc::new(Mutex::new(EstimationRoom::new(room_id, creator, tasks)));
        rooms.insert(String::from(room_id), Arc::clone(&room));

        Ok(room)
    }

    pub async fn room_exists(&self, room_id: &str) -> bool {
        self.rooms.lock().await.contains_key(room_id)
    }

    pub async fn get(&self, room_id: &str) -> Option<Arc<Mutex<EstimationRoom>>> {
        self.rooms.lock().await.get(room_id).map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn room_ids_are_unique() {
        let registry = RoomRegistry::new();

        assert!(!registry.room_exists("sprint-7").await);

        registry
            .create_room("sprint-7", User::new("ann-id", "ann"), Vec::new())
            .await
            .unwrap();

        assert!(registry.room_exists("sprint-7").await);
        assert!(registry
            .create_room("sprint-7", User::new("bob-id", "bob"), Vec::new())
            .await
            .is_err());
    }
}
