//! Recording test double for [`InferenceEngine`].
//!
//! Every call is appended to a log; responses are queued at build time and
//! consumed FIFO. When the queue is empty the engine echoes: text jobs get
//! their prompt back, image jobs get their (already preprocessed) image back.
//!
//! ```rust,ignore
//! let mock = MockEngine::builder().respond_text("Hello world").build();
//! let handler = RequestHandler::new(Modality::Text, mock.handle());
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hubserve_core::{
    EngineConcurrency, EngineError, EngineHandle, EngineInput, EngineOutput, InferenceEngine,
};

/// What one queued call should do
pub enum Scripted {
    Respond(EngineOutput),
    Fail(EngineError),
    Panic(&'static str),
}

#[derive(Default)]
struct MockState {
    calls: Vec<EngineInput>,
    script: VecDeque<Scripted>,
}

/// Cloneable handle onto one shared recording engine
#[derive(Clone)]
pub struct MockEngine {
    concurrency: EngineConcurrency,
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    pub fn builder() -> MockEngineBuilder {
        MockEngineBuilder::default()
    }

    /// Engine handle sharing this mock's state
    pub fn handle(&self) -> EngineHandle {
        EngineHandle::new(self.clone())
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().expect("mock state mutex poisoned").calls.len()
    }

    pub fn calls(&self) -> Vec<EngineInput> {
        self.state.lock().expect("mock state mutex poisoned").calls.clone()
    }

    pub fn last_call(&self) -> Option<EngineInput> {
        self.state
            .lock()
            .expect("mock state mutex poisoned")
            .calls
            .last()
            .cloned()
    }
}

#[async_trait]
impl InferenceEngine for MockEngine {
    fn name(&self) -> &str {
        "mock-engine"
    }

    fn concurrency(&self) -> EngineConcurrency {
        self.concurrency
    }

    async fn run(&self, input: EngineInput) -> Result<EngineOutput, EngineError> {
        let scripted = {
            let mut state = self.state.lock().expect("mock state mutex poisoned");
            state.calls.push(input.clone());
            state.script.pop_front()
        };

        match scripted {
            Some(Scripted::Respond(output)) => Ok(output),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Panic(msg)) => panic!("{msg}"),
            None => Ok(match input {
                EngineInput::Text { request, .. } => EngineOutput::Text(request.prompt),
                EngineInput::ImageEdit { image, .. } => EngineOutput::Image(image),
            }),
        }
    }
}

/// Builder for [`MockEngine`]
#[derive(Default)]
pub struct MockEngineBuilder {
    concurrency: EngineConcurrency,
    script: VecDeque<Scripted>,
}

impl MockEngineBuilder {
    pub fn concurrency(mut self, concurrency: EngineConcurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn respond_text(mut self, text: &str) -> Self {
        self.script
            .push_back(Scripted::Respond(EngineOutput::Text(text.to_string())));
        self
    }

    pub fn respond(mut self, output: EngineOutput) -> Self {
        self.script.push_back(Scripted::Respond(output));
        self
    }

    pub fn fail_with(mut self, err: EngineError) -> Self {
        self.script.push_back(Scripted::Fail(err));
        self
    }

    pub fn panic_with(mut self, msg: &'static str) -> Self {
        self.script.push_back(Scripted::Panic(msg));
        self
    }

    pub fn build(self) -> MockEngine {
        MockEngine {
            concurrency: self.concurrency,
            state: Arc::new(Mutex::new(MockState {
                calls: Vec::new(),
                script: self.script,
            })),
        }
    }
}
