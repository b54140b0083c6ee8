//! The editor main loop
//!
//! The [`Editor`] owns the terminal, the mode stack and the queue of
//! asynchronously posted commands, and runs the read-dispatch loop: let the
//! active mode idle and render, block for a key, dispatch it through the
//! mode's bindings, then drain any commands other threads have posted in
//! the meantime. The loop ends when the mode stack empties.
//!
//! Other threads talk to a running editor through [`AsyncHandle`]: posting
//! a command enqueues it under a mutex and writes one byte into the
//! terminal's wake pipe, which surfaces in the loop as the synthetic
//! [`keys::ASYNC_INTERRUPTED`] key.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::Config;
use crate::emacs::EmacsMode;
use crate::key::{keys, Key, KeyCombination};
use crate::mode::{Lookup, Mode};
use crate::search::SearchMode;
use crate::term::{TermError, Terminal};

/// A command posted from another thread. Owned by the queue and consumed
/// when run.
pub type AsyncCommand = Box<dyn FnOnce(&mut Editor) + Send>;

struct AsyncQueue {
    queue: Mutex<VecDeque<AsyncCommand>>,
    /// Write end of the running terminal's wake pipe, or -1 when no
    /// terminal is live.
    wake_fd: AtomicI32,
}

/// A clonable, `Send` handle for posting commands into a running editor.
#[derive(Clone)]
pub struct AsyncHandle {
    inner: Arc<AsyncQueue>,
}

impl AsyncHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(AsyncQueue {
                queue: Mutex::new(VecDeque::new()),
                wake_fd: AtomicI32::new(-1),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AsyncCommand>> {
        // A poisoned queue just means a command panicked; the queue itself
        // is still sound.
        match self.inner.queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Post a command. It runs on the editor thread after the current key's
    /// command finishes, in FIFO order.
    pub fn post(&self, command: impl FnOnce(&mut Editor) + Send + 'static) {
        self.lock().push_back(Box::new(command));
        let fd = self.inner.wake_fd.load(Ordering::Acquire);
        if fd >= 0 {
            crate::term::terminal::wake(fd);
        }
    }

    /// Post a one-shot command that runs `line` through the editing mode's
    /// driver as if it had been accepted, preserving whatever the user was
    /// editing.
    pub fn execute_line(&self, line: String) {
        self.post(move |editor| crate::emacs::run_async_line(editor, &line));
    }

    fn pop(&self) -> Option<AsyncCommand> {
        self.lock().pop_front()
    }

    fn set_wake_fd(&self, fd: RawFd) {
        self.inner.wake_fd.store(fd, Ordering::Release);
    }

    fn clear_wake_fd(&self) {
        self.inner.wake_fd.store(-1, Ordering::Release);
    }
}

/// Context handed to commands that operate on the Emacs editing mode.
pub(crate) struct EmacsCx<'a> {
    pub mode: &'a mut EmacsMode,
    pub terminal: Option<&'a mut Terminal>,
    /// Set to end the current mode once dispatch returns.
    pub end_mode: &'a mut bool,
}

/// Context handed to commands that operate on the search mode and its base.
pub(crate) struct SearchCx<'a> {
    pub search: &'a mut SearchMode,
    pub emacs: &'a mut EmacsMode,
    pub terminal: Option<&'a mut Terminal>,
    /// Set to end the search mode once dispatch returns.
    pub exit: &'a mut bool,
}

/// The line editor: terminal, mode stack, async command queue.
pub struct Editor {
    terminal: Option<Terminal>,
    modes: Vec<Box<dyn Mode>>,
    config: Config,
    async_queue: AsyncHandle,
    /// Deferred request to pop the top mode; applied after dispatch so a
    /// command never destroys the mode it is running against.
    end_requested: bool,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            terminal: None,
            modes: Vec::new(),
            config,
            async_queue: AsyncHandle::new(),
            end_requested: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The live terminal, if the editor is running with one.
    pub fn terminal_mut(&mut self) -> Option<&mut Terminal> {
        self.terminal.as_mut()
    }

    /// Push a mode; it becomes the active one.
    pub fn push_mode(&mut self, mode: Box<dyn Mode>) {
        self.modes.push(mode);
    }

    /// Request that the current mode end after the running command returns.
    pub fn end_mode(&mut self) {
        self.end_requested = true;
    }

    /// A handle for posting commands from other threads.
    pub fn async_handle(&self) -> AsyncHandle {
        self.async_queue.clone()
    }

    /// Run the editor until the mode stack empties. With `no_terminal`,
    /// keys are read unbuffered from stdin and nothing is rendered.
    pub fn run(&mut self, no_terminal: bool) -> Result<(), TermError> {
        if !no_terminal && self.terminal.is_none() {
            let mut terminal = Terminal::new()?;
            terminal.set_bell_enabled(self.config.bell);
            self.async_queue.set_wake_fd(terminal.interrupt_fd());
            self.terminal = Some(terminal);
        }
        let result = self.run_loop();
        self.async_queue.clear_wake_fd();
        // Dropping the terminal commits the final text and restores the
        // tty attributes.
        self.terminal = None;
        result
    }

    fn run_loop(&mut self) -> Result<(), TermError> {
        let mut stdin = io::stdin();
        while !self.modes.is_empty() {
            if let Some(terminal) = self.terminal.as_mut() {
                // We've gone idle waiting for input; let the mode catch up,
                // update the screen, then block.
                if let Some((top, below)) = self.modes.split_last_mut() {
                    top.idle();
                    top.render(below, terminal);
                }
                terminal.wait_for_key()?;
            }

            loop {
                if self.modes.is_empty() {
                    break;
                }
                let key = match self.terminal.as_mut() {
                    Some(terminal) => match terminal.get_key() {
                        Some(key) => key,
                        None => break,
                    },
                    None => read_stdin_key(&mut stdin),
                };

                self.dispatch(key);

                while let Some(command) = self.async_queue.pop() {
                    command(self);
                }
                if self.end_requested {
                    self.end_requested = false;
                    self.modes.pop();
                }

                let more = match self.terminal.as_mut() {
                    Some(terminal) => terminal.have_key()?,
                    None => false,
                };
                if !more {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Dispatch one key through the active mode.
    pub(crate) fn dispatch(&mut self, key: Key) {
        let combo = KeyCombination::from(key);
        let mut lookup = match self.modes.last_mut() {
            Some(mode) => mode.handler(&combo),
            None => return,
        };
        while matches!(lookup, Lookup::Fallthrough) {
            // The inner mode is done; show the base mode's view before its
            // handler runs, in case that handler commits the display.
            self.modes.pop();
            self.render_current();
            lookup = match self.modes.last_mut() {
                Some(mode) => mode.handler(&combo),
                None => return,
            };
        }
        match lookup {
            Lookup::Bound(command) => command.run(self, &combo),
            Lookup::Unbound => {
                if key != keys::ASYNC_INTERRUPTED {
                    if let Some(terminal) = self.terminal.as_mut() {
                        terminal.bell();
                    }
                }
            }
            Lookup::Fallthrough => unreachable!(),
        }
    }

    pub(crate) fn render_current(&mut self) {
        let Some(terminal) = self.terminal.as_mut() else {
            return;
        };
        if let Some((top, below)) = self.modes.split_last_mut() {
            top.render(below, terminal);
        }
    }

    /// Run `f` against the topmost Emacs mode, or do nothing if there is
    /// none.
    pub(crate) fn with_emacs<R>(&mut self, f: impl FnOnce(EmacsCx<'_>) -> R) -> Option<R> {
        let terminal = self.terminal.as_mut();
        let mode = self.modes.iter_mut().rev().find_map(|m| m.as_emacs())?;
        Some(f(EmacsCx {
            mode,
            terminal,
            end_mode: &mut self.end_requested,
        }))
    }

    /// Run `f` against the active search mode and the Emacs mode beneath
    /// it, or do nothing if the stack does not look like that.
    pub(crate) fn with_search<R>(&mut self, f: impl FnOnce(SearchCx<'_>) -> R) -> Option<R> {
        let terminal = self.terminal.as_mut();
        let (top, below) = self.modes.split_last_mut()?;
        let search = top.as_search()?;
        let emacs = below.iter_mut().rev().find_map(|m| m.as_emacs())?;
        Some(f(SearchCx {
            search,
            emacs,
            terminal,
            exit: &mut self.end_requested,
        }))
    }

    #[cfg(test)]
    pub(crate) fn drain_async(&mut self) {
        while let Some(command) = self.async_queue.pop() {
            command(self);
        }
    }

    #[cfg(test)]
    pub(crate) fn apply_end_requests(&mut self) {
        if self.end_requested {
            self.end_requested = false;
            self.modes.pop();
        }
    }

    #[cfg(test)]
    pub(crate) fn mode_depth(&self) -> usize {
        self.modes.len()
    }
}

fn read_stdin_key(stdin: &mut impl Read) -> Key {
    let mut byte = [0u8; 1];
    match stdin.read(&mut byte) {
        Ok(0) | Err(_) => keys::EOF,
        Ok(_) => Key::from(byte[0]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_async_handle_fifo_order() {
        let mut editor = Editor::new();
        let (tx, rx) = mpsc::channel();
        let handle = editor.async_handle();
        for n in 0..3 {
            let tx = tx.clone();
            handle.post(move |_editor| tx.send(n).unwrap());
        }
        editor.drain_async();
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_async_handle_is_send() {
        fn assert_send<T: Send>(_: &T) {}
        let editor = Editor::new();
        let handle = editor.async_handle();
        assert_send(&handle);

        let (tx, rx) = mpsc::channel();
        let thread = std::thread::spawn(move || {
            handle.post(move |_editor| tx.send(42).unwrap());
        });
        thread.join().unwrap();
        let mut editor = editor;
        editor.drain_async();
        assert_eq!(rx.recv().unwrap(), 42);
    }

    #[test]
    fn test_dispatch_on_empty_stack_is_noop() {
        let mut editor = Editor::new();
        editor.dispatch('a' as Key);
        assert_eq!(editor.mode_depth(), 0);
    }
}
