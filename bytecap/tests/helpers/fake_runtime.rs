//! In-process stand-in for a managed runtime and its class-loading hook

use std::sync::{Arc, Mutex};

use bytecap::capture::{AccessorError, CodeUnit, CodeUnitAccessor};
use bytecap::host::{HookError, InterceptionPoint, LoadObserver};

/// Backing code unit; several classes may share one
#[derive(Debug)]
pub struct FakeDex {
    pub bytes: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct FakeClass {
    pub name: Option<String>,
    pub dex: Option<Arc<FakeDex>>,
}

impl FakeClass {
    pub fn new(name: &str, dex: &Arc<FakeDex>) -> Self {
        Self {
            name: Some(name.to_string()),
            dex: Some(Arc::clone(dex)),
        }
    }
}

pub fn dex(bytes: &[u8]) -> Arc<FakeDex> {
    Arc::new(FakeDex {
        bytes: Some(bytes.to_vec()),
    })
}

#[derive(Debug, Default)]
pub struct FakeAccessor;

impl CodeUnitAccessor for FakeAccessor {
    type Class = FakeClass;

    fn class_name(&self, class: &FakeClass) -> Option<String> {
        class.name.clone()
    }

    fn resolve_code_unit(&self, class: &FakeClass) -> Result<Option<CodeUnit>, AccessorError> {
        Ok(class.dex.as_ref().map(|dex| CodeUnit::new(Arc::clone(dex))))
    }

    fn extract_bytes(&self, unit: &CodeUnit) -> Result<Option<Vec<u8>>, AccessorError> {
        let dex = unit
            .downcast_ref::<FakeDex>()
            .ok_or_else(|| AccessorError::failed("getBytes", "unexpected code unit type"))?;
        Ok(dex.bytes.clone())
    }
}

/// Hook that fans every load out to the installed observers
#[derive(Default)]
pub struct FakeLoadHook {
    observers: Mutex<Vec<Arc<dyn LoadObserver<FakeClass>>>>,
}

impl FakeLoadHook {
    pub fn load(&self, class: Option<&FakeClass>) {
        let observers = self.observers.lock().unwrap().clone();
        for observer in observers {
            observer.after_load(class);
        }
    }

    pub fn installed(&self) -> usize {
        self.observers.lock().unwrap().len()
    }
}

impl InterceptionPoint<FakeClass> for FakeLoadHook {
    fn install(&self, observer: Arc<dyn LoadObserver<FakeClass>>) -> Result<(), HookError> {
        self.observers.lock().unwrap().push(observer);
        Ok(())
    }
}
