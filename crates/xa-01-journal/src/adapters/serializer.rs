use crate::domain::errors::SerializationError;
use crate::domain::record::ArchivePayload;
use crate::ports::outbound::ArchiveSerializer;

/// Default payload serializer using bincode.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeArchiveSerializer;

impl ArchiveSerializer for BincodeArchiveSerializer {
    fn serialize(&self, payload: &ArchivePayload) -> Result<Vec<u8>, SerializationError> {
        bincode::serialize(payload).map_err(|e| SerializationError {
            message: e.to_string(),
        })
    }

    fn deserialize(&self, data: &[u8]) -> Result<ArchivePayload, SerializationError> {
        bincode::deserialize(data).map_err(|e| SerializationError {
            message: e.to_string(),
        })
    }
}
