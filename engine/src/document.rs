//! The catalog document: an automerge value holding the record list.
//!
//! Layout: the root map has a single `records` key holding a list of maps,
//! one per record. Records are inserted at the front (newest first) and then
//! edited field by field, so concurrent edits to different fields of the same
//! record merge independently.

use automerge::sync::{self, SyncDoc};
use automerge::transaction::{CommitOptions, Transactable, Transaction};
use automerge::{
    ActorId, Automerge, AutomergeError, ChangeHash, ObjId, ObjType, ReadDoc, ScalarValue, Value,
    ROOT,
};
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::record::{clamp_stock, FieldChange, Record, Roast};

/// Root key of the record list.
pub const RECORDS_KEY: &str = "records";

mod keys {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const ORIGIN: &str = "origin";
    pub const ROAST: &str = "roast";
    pub const TASTING_NOTES: &str = "tastingNotes";
    pub const STOCK: &str = "stock";
    pub const PRICE: &str = "price";
}

/// Namespace for deriving the actor of a seed change from its content.
const SEED_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes(*b"beanline-seed-ns");

/// A catalog document.
///
/// Cloning produces an independent value; the store publishes documents
/// behind an `Arc` and never edits a published one.
#[derive(Debug, Clone)]
pub struct Document {
    inner: Automerge,
}

impl Document {
    /// A document with no history at all.
    ///
    /// Used by replicas that receive their whole state from a peer. It has no
    /// record list until the first sync delivers one.
    pub fn empty() -> Self {
        Self {
            inner: Automerge::new(),
        }
    }

    /// Create a document holding `records`.
    ///
    /// The seed change is written by an actor derived from the seed content
    /// with a fixed timestamp, so two documents seeded with the same records
    /// share the same root change and sync as descendants of one ancestor.
    /// Later edits use a fresh random actor.
    pub fn seeded(records: &[Record]) -> Result<Self> {
        let mut seen = HashSet::new();
        for record in records {
            record.validate()?;
            if !seen.insert(record.id.as_str()) {
                return Err(Error::RecordAlreadyExists(record.id.clone()));
            }
        }

        let mut inner = Automerge::new().with_actor(seed_actor(records)?);
        inner
            .transact_with(
                |_| CommitOptions::default().with_time(0),
                |tx| write_seed(tx, records),
            )
            .map_err(|failure| Error::from(failure.error))?;
        inner.set_actor(ActorId::random());

        Ok(Self { inner })
    }

    /// Reconstruct a document from its saved form.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let inner = Automerge::load(bytes).map_err(|e| Error::CorruptDocument(e.to_string()))?;
        match inner.get(ROOT, RECORDS_KEY) {
            Ok(Some((Value::Object(ObjType::List), _))) => Ok(Self { inner }),
            _ => Err(Error::CorruptDocument(format!(
                "missing '{}' list at document root",
                RECORDS_KEY
            ))),
        }
    }

    /// Serialize the full document.
    pub fn save(&self) -> Vec<u8> {
        self.inner.save()
    }

    /// Current heads of the change graph.
    ///
    /// Two values of the same lineage with equal heads have equal content.
    pub fn heads(&self) -> Vec<ChangeHash> {
        self.inner.get_heads()
    }

    /// Deep copy of every record, in list order.
    pub fn records(&self) -> Vec<Record> {
        read_records(&self.inner)
    }

    /// Look up one record by id.
    pub fn record(&self, id: &str) -> Option<Record> {
        let list = records_list(&self.inner)?;
        let (_, obj) = find_record(&self.inner, &list, id)?;
        read_record(&self.inner, &obj)
    }

    /// Apply a local edit as exactly one change.
    ///
    /// If `edit` fails the transaction is rolled back and the document is
    /// left untouched.
    pub fn edit<F, T>(&mut self, edit: F) -> Result<T>
    where
        F: FnOnce(&mut CatalogEditor<'_, '_>) -> Result<T>,
    {
        self.inner
            .transact(|tx| {
                let mut editor = CatalogEditor::open(tx)?;
                edit(&mut editor)
            })
            .map(|success| success.result)
            .map_err(|failure| failure.error)
    }

    /// Produce the next outgoing sync message for a peer, if any.
    pub fn generate_sync_message(&self, state: &mut sync::State) -> Option<sync::Message> {
        self.inner.generate_sync_message(state)
    }

    /// Merge an incoming sync message from a peer.
    pub fn receive_sync_message(
        &mut self,
        state: &mut sync::State,
        message: sync::Message,
    ) -> Result<()> {
        self.inner
            .receive_sync_message(state, message)
            .map_err(|e| Error::MalformedMessage(e.to_string()))
    }
}

/// Mutable view of the record list scoped to one transaction.
pub struct CatalogEditor<'a, 'doc> {
    tx: &'a mut Transaction<'doc>,
    list: ObjId,
}

impl<'a, 'doc> CatalogEditor<'a, 'doc> {
    fn open(tx: &'a mut Transaction<'doc>) -> Result<Self> {
        let list = records_list(&*tx)
            .ok_or_else(|| Error::Crdt(format!("document has no '{}' list", RECORDS_KEY)))?;
        Ok(Self { tx, list })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.tx.length(&self.list)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every record as of this point in the transaction.
    pub fn records(&self) -> Vec<Record> {
        read_records(&*self.tx)
    }

    /// Look up a record by id.
    pub fn get(&self, id: &str) -> Option<Record> {
        let (_, obj) = find_record(&*self.tx, &self.list, id)?;
        read_record(&*self.tx, &obj)
    }

    /// Id of the record at `index`.
    pub fn id_at(&self, index: usize) -> Option<String> {
        match self.tx.get(&self.list, index) {
            Ok(Some((Value::Object(ObjType::Map), obj))) => read_string(&*self.tx, &obj, keys::ID),
            _ => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        find_record(&*self.tx, &self.list, id).is_some()
    }

    /// Insert a new record at the front of the list.
    pub fn insert_front(&mut self, record: &Record) -> Result<()> {
        record.validate()?;
        if self.contains(&record.id) {
            return Err(Error::RecordAlreadyExists(record.id.clone()));
        }
        insert_record(self.tx, &self.list, 0, record)?;
        Ok(())
    }

    /// Set the stock of a record, returning the updated record.
    pub fn set_stock(&mut self, id: &str, stock: u32) -> Result<Record> {
        let obj = self.require(id)?;
        self.tx.put(&obj, keys::STOCK, i64::from(stock))?;
        self.reread(id)
    }

    /// Apply a field change to a record, returning the updated record.
    pub fn apply(&mut self, id: &str, change: &FieldChange) -> Result<Record> {
        change.validate()?;
        let obj = self.require(id)?;

        match change {
            FieldChange::Stock { delta } => {
                let current = read_int(&*self.tx, &obj, keys::STOCK).unwrap_or(0);
                let current = u32::try_from(current.max(0)).unwrap_or(u32::MAX);
                self.tx
                    .put(&obj, keys::STOCK, i64::from(clamp_stock(current, *delta)))?;
            }
            FieldChange::Price { value } => self.tx.put(&obj, keys::PRICE, *value)?,
            FieldChange::Name { value } => self.tx.put(&obj, keys::NAME, value.as_str())?,
            FieldChange::Origin { value } => self.tx.put(&obj, keys::ORIGIN, value.as_str())?,
            FieldChange::Roast { value } => self.tx.put(&obj, keys::ROAST, value.as_str())?,
            FieldChange::AddTastingNote { value } => {
                let notes = self.notes_list(&obj)?;
                let present = read_string_list(&*self.tx, &notes).contains(value);
                if !present {
                    let end = self.tx.length(&notes);
                    self.tx.insert(&notes, end, value.as_str())?;
                }
            }
            FieldChange::RemoveTastingNote { value } => {
                let notes = self.notes_list(&obj)?;
                let current = read_string_list(&*self.tx, &notes);
                for (index, note) in current.iter().enumerate().rev() {
                    if note == value {
                        self.tx.delete(&notes, index)?;
                    }
                }
            }
        }

        self.reread(id)
    }

    fn require(&self, id: &str) -> Result<ObjId> {
        find_record(&*self.tx, &self.list, id)
            .map(|(_, obj)| obj)
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))
    }

    fn reread(&self, id: &str) -> Result<Record> {
        self.get(id)
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))
    }

    fn notes_list(&mut self, obj: &ObjId) -> Result<ObjId> {
        match self.tx.get(obj, keys::TASTING_NOTES)? {
            Some((Value::Object(ObjType::List), notes)) => Ok(notes),
            _ => Ok(self
                .tx
                .put_object(obj, keys::TASTING_NOTES, ObjType::List)?),
        }
    }
}

fn seed_actor(records: &[Record]) -> Result<ActorId> {
    let content = serde_json::to_vec(records).map_err(|e| Error::InvalidRecord(e.to_string()))?;
    let id = uuid::Uuid::new_v5(&SEED_NAMESPACE, &content);
    Ok(ActorId::from(&id.as_bytes()[..]))
}

fn write_seed(tx: &mut Transaction<'_>, records: &[Record]) -> std::result::Result<(), AutomergeError> {
    let list = tx.put_object(ROOT, RECORDS_KEY, ObjType::List)?;
    for (index, record) in records.iter().enumerate() {
        insert_record(tx, &list, index, record)?;
    }
    Ok(())
}

fn insert_record(
    tx: &mut Transaction<'_>,
    list: &ObjId,
    index: usize,
    record: &Record,
) -> std::result::Result<(), AutomergeError> {
    let obj = tx.insert_object(list, index, ObjType::Map)?;
    tx.put(&obj, keys::ID, record.id.as_str())?;
    tx.put(&obj, keys::NAME, record.name.as_str())?;
    tx.put(&obj, keys::ORIGIN, record.origin.as_str())?;
    tx.put(&obj, keys::ROAST, record.roast.as_str())?;
    let notes = tx.put_object(&obj, keys::TASTING_NOTES, ObjType::List)?;
    for (i, note) in record.tasting_notes.iter().enumerate() {
        tx.insert(&notes, i, note.as_str())?;
    }
    tx.put(&obj, keys::STOCK, i64::from(record.stock))?;
    tx.put(&obj, keys::PRICE, record.price)?;
    Ok(())
}

fn records_list<D: ReadDoc>(doc: &D) -> Option<ObjId> {
    match doc.get(ROOT, RECORDS_KEY) {
        Ok(Some((Value::Object(ObjType::List), list))) => Some(list),
        _ => None,
    }
}

fn find_record<D: ReadDoc>(doc: &D, list: &ObjId, id: &str) -> Option<(usize, ObjId)> {
    (0..doc.length(list)).find_map(|index| match doc.get(list, index) {
        Ok(Some((Value::Object(ObjType::Map), obj))) => {
            (read_string(doc, &obj, keys::ID).as_deref() == Some(id)).then_some((index, obj))
        }
        _ => None,
    })
}

/// Concurrent inserts can leave two entries with one id. Only the first in
/// list order is visible, matching `find_record`.
fn read_records<D: ReadDoc>(doc: &D) -> Vec<Record> {
    let Some(list) = records_list(doc) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    (0..doc.length(&list))
        .filter_map(|index| match doc.get(&list, index) {
            Ok(Some((Value::Object(ObjType::Map), obj))) => read_record(doc, &obj),
            _ => None,
        })
        .filter(|record| seen.insert(record.id.clone()))
        .collect()
}

fn read_record<D: ReadDoc>(doc: &D, obj: &ObjId) -> Option<Record> {
    let id = read_string(doc, obj, keys::ID)?;
    let roast = read_string(doc, obj, keys::ROAST)
        .and_then(|r| r.parse::<Roast>().ok())
        .unwrap_or(Roast::Medium);
    let tasting_notes = match doc.get(obj, keys::TASTING_NOTES) {
        Ok(Some((Value::Object(ObjType::List), notes))) => read_string_list(doc, &notes),
        _ => Vec::new(),
    };
    let stock = read_int(doc, obj, keys::STOCK)
        .map(|s| u32::try_from(s.max(0)).unwrap_or(u32::MAX))
        .unwrap_or(0);

    Some(Record {
        id,
        name: read_string(doc, obj, keys::NAME).unwrap_or_default(),
        origin: read_string(doc, obj, keys::ORIGIN).unwrap_or_default(),
        roast,
        tasting_notes,
        stock,
        price: read_f64(doc, obj, keys::PRICE).unwrap_or(0.0),
    })
}

fn read_string_list<D: ReadDoc>(doc: &D, list: &ObjId) -> Vec<String> {
    (0..doc.length(list))
        .filter_map(|index| match doc.get(list, index) {
            Ok(Some((Value::Scalar(value), _))) => match value.as_ref() {
                ScalarValue::Str(s) => Some(s.to_string()),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

fn scalar<D: ReadDoc>(doc: &D, obj: &ObjId, key: &str) -> Option<ScalarValue> {
    match doc.get(obj, key) {
        Ok(Some((Value::Scalar(value), _))) => Some(value.into_owned()),
        _ => None,
    }
}

fn read_string<D: ReadDoc>(doc: &D, obj: &ObjId, key: &str) -> Option<String> {
    match scalar(doc, obj, key)? {
        ScalarValue::Str(s) => Some(s.to_string()),
        _ => None,
    }
}

fn read_int<D: ReadDoc>(doc: &D, obj: &ObjId, key: &str) -> Option<i64> {
    match scalar(doc, obj, key)? {
        ScalarValue::Int(i) => Some(i),
        ScalarValue::Uint(u) => Some(i64::try_from(u).unwrap_or(i64::MAX)),
        ScalarValue::F64(f) if f.is_finite() => Some(f as i64),
        _ => None,
    }
}

fn read_f64<D: ReadDoc>(doc: &D, obj: &ObjId, key: &str) -> Option<f64> {
    match scalar(doc, obj, key)? {
        ScalarValue::F64(f) => Some(f),
        ScalarValue::Int(i) => Some(i as f64),
        ScalarValue::Uint(u) => Some(u as f64),
        _ => None,
    }
}
