// File: src/test_utils/helpers.rs
//
// A scripted, recording protocol client. Tests seed group rosters and
// contact records, then assert on what the dispatch pipeline sent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use mochibot_common::models::{
    AdminRank, ContactRecord, GroupMetadata, GroupParticipant, InboundMessage, MediaKind,
    MediaPayload, ParticipantAction, PresenceState,
};
use mochibot_common::traits::ProtocolClient;
use mochibot_common::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat: String,
    pub text: String,
    pub quoted_id: Option<String>,
}

#[derive(Default)]
pub struct RecordingClient {
    pub self_jid: String,
    groups: Mutex<HashMap<String, GroupMetadata>>,
    contacts: Mutex<HashMap<String, ContactRecord>>,
    names: Mutex<HashMap<String, String>>,

    pub sent: Mutex<Vec<SentMessage>>,
    pub sent_media: Mutex<Vec<(String, MediaKind)>>,
    pub reactions: Mutex<Vec<(String, String)>>,
    pub presence_updates: Mutex<Vec<(String, PresenceState)>>,
    pub reads: Mutex<Vec<String>>,
    pub participant_updates: Mutex<Vec<(String, Vec<String>, ParticipantAction)>>,
    pub deleted: Mutex<Vec<(String, String, String)>>,

    pub metadata_calls: AtomicUsize,
    pub contact_calls: AtomicUsize,
    /// Fail this many roster fetches before succeeding. `usize::MAX` fails
    /// forever.
    pub metadata_failures: AtomicUsize,
}

impl RecordingClient {
    pub fn new(self_jid: &str) -> Self {
        Self {
            self_jid: self_jid.to_string(),
            ..Default::default()
        }
    }

    pub fn add_group(&self, chat: &str, subject: &str, participants: Vec<GroupParticipant>) {
        self.groups.lock().unwrap().insert(
            chat.to_string(),
            GroupMetadata {
                id: chat.to_string(),
                subject: subject.to_string(),
                participants,
            },
        );
    }

    pub fn add_contact(&self, jid: &str, lid: Option<&str>) {
        self.contacts.lock().unwrap().insert(
            jid.to_string(),
            ContactRecord {
                jid: jid.to_string(),
                lid: lid.map(str::to_string),
                exists: true,
            },
        );
    }

    pub fn add_name(&self, jid: &str, name: &str) {
        self.names
            .lock()
            .unwrap()
            .insert(jid.to_string(), name.to_string());
    }

    pub fn fail_metadata_forever(&self) {
        self.metadata_failures.store(usize::MAX, Ordering::SeqCst);
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|s| s.text.clone()).collect()
    }

    pub fn sent_to(&self, chat: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.chat == chat)
            .map(|s| s.text.clone())
            .collect()
    }
}

pub fn participant(id: &str, admin: Option<AdminRank>) -> GroupParticipant {
    GroupParticipant {
        id: id.to_string(),
        jid: None,
        admin,
        name: None,
    }
}

#[async_trait]
impl ProtocolClient for RecordingClient {
    fn self_jid(&self) -> String {
        self.self_jid.clone()
    }

    async fn group_metadata(&self, chat: &str) -> Result<GroupMetadata, Error> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let failures = self.metadata_failures.load(Ordering::SeqCst);
        if failures > 0 {
            if failures != usize::MAX {
                self.metadata_failures.store(failures - 1, Ordering::SeqCst);
            }
            return Err(Error::Platform("roster fetch failed".to_string()));
        }
        self.groups
            .lock()
            .unwrap()
            .get(chat)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("group {chat}")))
    }

    async fn contact_lookup(&self, jid: &str) -> Result<Option<ContactRecord>, Error> {
        self.contact_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.contacts.lock().unwrap().get(jid).cloned())
    }

    async fn get_name(&self, jid: &str) -> Option<String> {
        self.names.lock().unwrap().get(jid).cloned()
    }

    async fn send_text(
        &self,
        chat: &str,
        text: &str,
        quoted: Option<&InboundMessage>,
    ) -> Result<(), Error> {
        self.sent.lock().unwrap().push(SentMessage {
            chat: chat.to_string(),
            text: text.to_string(),
            quoted_id: quoted.map(|m| m.id.clone()),
        });
        Ok(())
    }

    async fn send_media(
        &self,
        chat: &str,
        media: &MediaPayload,
        _quoted: Option<&InboundMessage>,
    ) -> Result<(), Error> {
        self.sent_media
            .lock()
            .unwrap()
            .push((chat.to_string(), media.kind));
        Ok(())
    }

    async fn react(&self, msg: &InboundMessage, emoji: &str) -> Result<(), Error> {
        self.reactions
            .lock()
            .unwrap()
            .push((msg.id.clone(), emoji.to_string()));
        Ok(())
    }

    async fn send_presence(&self, chat: &str, state: PresenceState) -> Result<(), Error> {
        self.presence_updates
            .lock()
            .unwrap()
            .push((chat.to_string(), state));
        Ok(())
    }

    async fn read_messages(&self, ids: &[String]) -> Result<(), Error> {
        self.reads.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }

    async fn group_participants_update(
        &self,
        chat: &str,
        participants: &[String],
        action: ParticipantAction,
    ) -> Result<(), Error> {
        self.participant_updates.lock().unwrap().push((
            chat.to_string(),
            participants.to_vec(),
            action,
        ));
        Ok(())
    }

    async fn delete_message(
        &self,
        chat: &str,
        message_id: &str,
        participant: &str,
    ) -> Result<(), Error> {
        self.deleted.lock().unwrap().push((
            chat.to_string(),
            message_id.to_string(),
            participant.to_string(),
        ));
        Ok(())
    }
}
