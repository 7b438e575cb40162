//! 常驻事件循环：同步调用方与异步 Agent 能力之间的桥
//!
//! 一个专用后台线程持有 current_thread tokio 运行时并常驻运行；run_blocking 把 future 投递到该循环，
//! 阻塞调用线程直到完成或超时。超时只释放调用线程，不取消已投递的任务。
//! 所有 Agent 调用都必须经由这里调度。

use std::future::Future;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tokio::runtime::{Builder, Handle};
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentClient, AgentVariant, ConversationHandle};
use crate::core::error::{CoreError, Result};

/// 默认阻塞等待上限
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

struct LoopThread {
    handle: Handle,
    shutdown: CancellationToken,
    thread_id: ThreadId,
    join: Option<JoinHandle<()>>,
}

impl LoopThread {
    fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.join.as_ref().map_or(true, |j| j.is_finished())
    }

    fn spawn() -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let join = thread::Builder::new()
            .name("pathwise-run-loop".to_string())
            .spawn(move || {
                let rt = match Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(rt.handle().clone()));
                // block_on 驱动所有经 Handle::spawn 投递的任务，直到收到关闭信号
                rt.block_on(token.cancelled());
                tracing::info!("Run loop stopped");
            })
            .map_err(|e| {
                tracing::error!("Failed to spawn run loop thread: {}", e);
                CoreError::RunLoopClosed
            })?;

        let handle = match ready_rx.recv() {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                tracing::error!("Failed to build run loop runtime: {}", e);
                return Err(CoreError::RunLoopClosed);
            }
            Err(_) => return Err(CoreError::RunLoopClosed),
        };

        tracing::info!("Run loop started");
        Ok(Self {
            handle,
            shutdown,
            thread_id: join.thread().id(),
            join: Some(join),
        })
    }
}

/// 执行底座：常驻事件循环 + 带超时的阻塞桥接
pub struct AgentRuntime {
    inner: Mutex<Option<LoopThread>>,
    timeout: Duration,
}

impl AgentRuntime {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(None),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 幂等启动：已运行且未关闭时什么都不做，任意线程可调用
    pub fn ensure_running(&self) -> Result<()> {
        self.current().map(|_| ())
    }

    pub fn is_running(&self) -> bool {
        self.lock().as_ref().map_or(false, |l| !l.is_closed())
    }

    fn current(&self) -> Result<(Handle, ThreadId)> {
        let mut inner = self.lock();
        if let Some(existing) = inner.as_ref() {
            if !existing.is_closed() {
                return Ok((existing.handle.clone(), existing.thread_id));
            }
        }
        let started = LoopThread::spawn()?;
        let out = (started.handle.clone(), started.thread_id);
        *inner = Some(started);
        Ok(out)
    }

    /// 把 task 投递到常驻循环并阻塞等待结果
    ///
    /// 超时返回 `CoreError::Timeout`，任务仍在后台继续运行。
    pub fn run_blocking<F, T>(&self, task: F) -> Result<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (handle, loop_thread) = self.current()?;
        if thread::current().id() == loop_thread {
            return Err(CoreError::ReentrantCall);
        }

        let (tx, rx) = mpsc::sync_channel(1);
        handle.spawn(async move {
            let out = task.await;
            let _ = tx.send(out);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(out) => Ok(out),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("Agent call timed out after {:?}; task left running", self.timeout);
                Err(CoreError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                if self.is_running() {
                    Err(CoreError::WorkerPanicked("run loop task aborted".to_string()))
                } else {
                    Err(CoreError::RunLoopClosed)
                }
            }
        }
    }

    /// 经由事件循环打开新对话
    pub fn open_conversation(
        &self,
        agent: &Arc<dyn AgentClient>,
        variant: AgentVariant,
    ) -> Result<ConversationHandle> {
        let agent = Arc::clone(agent);
        let handle = self.run_blocking(async move { agent.new_conversation(variant).await })?;
        Ok(handle?)
    }

    /// 经由事件循环在对话中发送消息并收集全部输出
    pub fn invoke(
        &self,
        agent: &Arc<dyn AgentClient>,
        conversation: &ConversationHandle,
        text: &str,
    ) -> Result<String> {
        let agent = Arc::clone(agent);
        let conversation = conversation.clone();
        let text = text.to_string();
        let reply = self.run_blocking(async move { agent.invoke(&conversation, &text).await })?;
        Ok(reply?)
    }

    /// 停止事件循环；之后的 ensure_running 会启动新的循环
    pub fn shutdown(&self) {
        let taken = self.lock().take();
        if let Some(mut lt) = taken {
            lt.shutdown.cancel();
            if thread::current().id() != lt.thread_id {
                if let Some(join) = lt.join.take() {
                    let _ = join.join();
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<LoopThread>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for AgentRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_TIMEOUT)
    }
}

impl Drop for AgentRuntime {
    fn drop(&mut self) {
        if let Some(lt) = self.lock().as_ref() {
            lt.shutdown.cancel();
        }
    }
}
