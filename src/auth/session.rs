use crate::db::models::RefreshTokenRecord;

pub const DEFAULT_MAX_DEVICES: usize = 3;

/// Multi-device admission for refresh tokens: newest first, oldest evicted
/// once the cap is exceeded. Eviction is by insertion order, not by use.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    max_devices: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEVICES)
    }
}

impl SessionPolicy {
    pub fn new(max_devices: usize) -> Self {
        Self {
            max_devices: max_devices.max(1),
        }
    }

    pub fn max_devices(&self) -> usize {
        self.max_devices
    }

    /// Returns the records evicted to make room.
    pub fn admit(
        &self,
        sessions: &mut Vec<RefreshTokenRecord>,
        record: RefreshTokenRecord,
    ) -> Vec<RefreshTokenRecord> {
        sessions.insert(0, record);
        if sessions.len() > self.max_devices {
            sessions.split_off(self.max_devices)
        } else {
            Vec::new()
        }
    }

    /// Removes the record holding `token`; reports whether one was present.
    pub fn revoke(&self, sessions: &mut Vec<RefreshTokenRecord>, token: &str) -> bool {
        let before = sessions.len();
        sessions.retain(|r| r.token != token);
        sessions.len() != before
    }
}
