use std::io::Cursor;
use std::net::Ipv4Addr;

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, instrument};

use super::{Header, Networkable, Question, ResourceRecord};
use crate::header::{HEADER_LEN, OPCODE_QUERY, RCODE_NOT_IMPLEMENTED};
use crate::resource_record::LOCAL_TTL;
use crate::DnsError;

/// Classic UDP payload ceiling (RFC 1035 §4.2.1).
pub const MAX_UDP_LEN: usize = 512;

// Smallest possible encodings: root name plus fixed fields.
const MIN_QUESTION_LEN: usize = 5;
const MIN_RECORD_LEN: usize = 11;

/// Address handed out for every locally answered question unless configured
/// otherwise.
pub const PLACEHOLDER_ADDRESS: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

/// A message with its question and answer sections. Authority and additional
/// sections are never produced and are skipped when decoding.
#[derive(Debug, Default, Clone)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
}

impl Message {
    pub fn new(header: Header) -> Self {
        Self {
            header,
            ..Default::default()
        }
    }

    pub fn add_question(&mut self, question: Question) {
        self.questions.push(question)
    }

    pub fn add_answer(&mut self, answer: ResourceRecord) {
        self.answers.push(answer)
    }

    /// Decodes an inbound query: the header and exactly `qdcount` questions.
    /// Whatever follows the question section is ignored.
    #[instrument(level = "debug", skip_all)]
    pub fn parse_query(data: &[u8]) -> Result<Self, DnsError> {
        Self::decode(&mut Cursor::new(data), false)
    }

    fn decode(bytes: &mut Cursor<&[u8]>, with_answers: bool) -> Result<Self, DnsError> {
        let header = Header::from_bytes(bytes)?;

        // The counts come off the wire, the buffer bounds what can follow
        let mut questions = Vec::with_capacity(
            (header.num_questions() as usize).min(bytes.remaining() / MIN_QUESTION_LEN),
        );
        for _ in 0..header.num_questions() {
            questions.push(Question::from_bytes(bytes)?);
        }

        let mut answers = Vec::new();
        if with_answers {
            answers.reserve(
                (header.num_answers() as usize).min(bytes.remaining() / MIN_RECORD_LEN),
            );
            for _ in 0..header.num_answers() {
                answers.push(ResourceRecord::from_bytes(bytes)?);
            }
        }

        Ok(Self {
            header,
            questions,
            answers,
        })
    }

    pub fn rcode(&self) -> u8 {
        self.header.flags.rcode()
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_LEN
            + self.questions.iter().map(Question::encoded_len).sum::<usize>()
            + self.answers.iter().map(ResourceRecord::encoded_len).sum::<usize>()
    }

    /// Encodes for a UDP reply of at most `limit` bytes. When the full message
    /// does not fit, TC is set and trailing answers are dropped, then trailing
    /// questions if the answers alone were not enough.
    pub fn to_udp_bytes(&self, limit: usize) -> Bytes {
        if self.encoded_len() <= limit {
            return self.to_bytes();
        }

        let mut truncated = self.clone();
        truncated.header.flags.set_tc(true);
        while truncated.encoded_len() > limit && truncated.answers.pop().is_some() {}
        while truncated.encoded_len() > limit && truncated.questions.pop().is_some() {}

        debug!(
            id = self.header.id,
            dropped_answers = self.answers.len() - truncated.answers.len(),
            dropped_questions = self.questions.len() - truncated.questions.len(),
            "truncated response"
        );

        truncated.to_bytes()
    }

    /// The reply the server gives when it answers by itself: a placeholder
    /// address for every question of a standard query, "not implemented" for
    /// any other opcode.
    pub fn local_response(request: &Message, address: Ipv4Addr) -> Self {
        let mut response = Self::new(Header::response_to(&request.header));
        response.questions = request.questions.clone();

        if request.header.flags.opcode() == OPCODE_QUERY {
            response.answers = request
                .questions
                .iter()
                .map(|q| ResourceRecord::a(q.name.clone(), LOCAL_TTL, address))
                .collect();
        } else {
            response.header.flags.set_rcode(RCODE_NOT_IMPLEMENTED);
        }

        response
    }
}

// Counts are derived from the sections, so they take no part in equality.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.header.id == other.header.id
            && self.header.flags == other.header.flags
            && self.questions == other.questions
            && self.answers == other.answers
    }
}

impl Eq for Message {}

impl Networkable for Message {
    #[instrument(level = "debug", skip_all)]
    fn to_bytes(&self) -> Bytes {
        let header = Header {
            num_questions: self.questions.len() as u16,
            num_answers: self.answers.len() as u16,
            num_authorities: 0,
            num_additionals: 0,
            ..self.header.clone()
        };

        let mut response = BytesMut::with_capacity(self.encoded_len());
        response.extend_from_slice(&header.to_bytes());

        for question in self.questions.iter() {
            response.extend_from_slice(&question.to_bytes())
        }

        for record in self.answers.iter() {
            response.extend_from_slice(&record.to_bytes())
        }

        response.freeze()
    }

    /// Decodes header, questions and answers.
    #[instrument(level = "debug", skip_all)]
    fn from_bytes(bytes: &mut Cursor<&[u8]>) -> Result<Self, DnsError> {
        Self::decode(bytes, true)
    }
}
