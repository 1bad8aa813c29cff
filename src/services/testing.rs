//! In-memory fakes shared by service tests

use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use super::cache_bust::CacheBuster;
use super::source::{DataSource, SourceError};
use super::store::MonthStore;
use crate::types::{CalendarDay, MonthRecord, RepoTotals, Result, UserPackage, WrapError};

/// One-day package: `contribs` on the first of `month` in repo "octo/app"
pub fn package_for(month: NaiveDate, contribs: u64) -> UserPackage {
    let mut pkg = UserPackage::empty();
    pkg.record_day(
        month,
        &CalendarDay {
            contribs,
            repos_created: 0,
        },
    );
    pkg.record_repo(
        "octo/app",
        &RepoTotals {
            contribs,
            commits: contribs,
            ..Default::default()
        },
    );
    pkg
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCall {
    pub user_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub suppress_errors: bool,
    pub had_token: bool,
}

/// Replays scripted responses per month start; unscripted months succeed with
/// `package_for(month, 1)`.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<NaiveDate, VecDeque<std::result::Result<UserPackage, SourceError>>>>,
    calls: Mutex<Vec<SourceCall>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(
        &self,
        month: NaiveDate,
        responses: Vec<std::result::Result<UserPackage, SourceError>>,
    ) {
        self.scripts
            .lock()
            .unwrap()
            .insert(month, responses.into_iter().collect());
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, month: NaiveDate) -> Vec<SourceCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.start == month)
            .collect()
    }
}

impl DataSource for ScriptedSource {
    fn fetch(
        &self,
        user_id: &str,
        access_token: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
        _tz: Tz,
        suppress_errors: bool,
    ) -> std::result::Result<UserPackage, SourceError> {
        self.calls.lock().unwrap().push(SourceCall {
            user_id: user_id.to_string(),
            start,
            end,
            suppress_errors,
            had_token: access_token.is_some(),
        });

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&start)
            .and_then(|q| q.pop_front());
        scripted.unwrap_or_else(|| Ok(package_for(start, 1)))
    }
}

type RecordKey = (String, bool, NaiveDate);

/// Month store backed by a map, with a switch to make saves fail
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<RecordKey, MonthRecord>>,
    saves: Mutex<Vec<MonthRecord>>,
    key_refreshes: Mutex<u32>,
    fail_saves: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: MonthRecord) {
        let key = (record.user_id.clone(), record.private, record.month);
        self.records.lock().unwrap().insert(key, record);
    }

    pub fn get(&self, user_id: &str, private: bool, month: NaiveDate) -> Option<MonthRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), private, month))
            .cloned()
    }

    pub fn saves(&self) -> Vec<MonthRecord> {
        self.saves.lock().unwrap().clone()
    }

    pub fn key_refreshes(&self) -> u32 {
        *self.key_refreshes.lock().unwrap()
    }

    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }
}

impl MonthStore for MemoryStore {
    fn load_range(
        &self,
        user_id: &str,
        private: bool,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MonthRecord>> {
        let first = super::month_classifier::first_of_month(start);
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id && r.private == private)
            .filter(|r| r.month >= first && r.month <= end)
            .cloned()
            .collect())
    }

    fn save(&self, record: &MonthRecord) -> Result<()> {
        if *self.fail_saves.lock().unwrap() {
            return Err(WrapError::Persistence("store offline".into()));
        }
        self.saves.lock().unwrap().push(record.clone());
        self.insert(record.clone());
        Ok(())
    }

    fn refresh_access_keys(&self) -> Result<()> {
        *self.key_refreshes.lock().unwrap() += 1;
        Ok(())
    }
}

/// Records every cache-bust it is asked to send
#[derive(Default)]
pub struct RecordingBuster {
    busted: Mutex<Vec<String>>,
}

impl RecordingBuster {
    pub fn busted(&self) -> Vec<String> {
        self.busted.lock().unwrap().clone()
    }
}

impl CacheBuster for RecordingBuster {
    fn bust(&self, user_id: &str) {
        self.busted.lock().unwrap().push(user_id.to_string());
    }
}
