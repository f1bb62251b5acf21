use avsync_core::{Participant, ParticipantId};
use avsync_experiment::{
    BatchPayload, JsonFileSink, OfflineSink, PersistenceSink, QuestionnairePayload,
    ResponsePayload, SinkError,
};

/// The sink chosen on the command line.
pub enum SessionSink {
    File(JsonFileSink),
    Offline(OfflineSink),
}

impl SessionSink {
    fn get(&mut self) -> &mut dyn PersistenceSink {
        match self {
            SessionSink::File(s) => s,
            SessionSink::Offline(s) => s,
        }
    }
}

impl PersistenceSink for SessionSink {
    fn register_participant(
        &mut self,
        participant: &Participant,
    ) -> Result<ParticipantId, SinkError> {
        self.get().register_participant(participant)
    }

    fn submit_questionnaire(&mut self, payload: &QuestionnairePayload) -> Result<(), SinkError> {
        self.get().submit_questionnaire(payload)
    }

    fn submit_response(&mut self, payload: &ResponsePayload) -> Result<(), SinkError> {
        self.get().submit_response(payload)
    }

    fn submit_batch(&mut self, payload: &BatchPayload) -> Result<(), SinkError> {
        self.get().submit_batch(payload)
    }
}
