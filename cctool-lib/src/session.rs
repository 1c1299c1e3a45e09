//! 调试会话接口
//!
//! 物理层（时钟、引脚、位时序）不在本库中实现，只通过 [`DebugSession`]
//! 提供的原语访问目标芯片。

use crate::Result;
use std::ops::{Deref, DerefMut};
use strum::Display;

/// Primitive operations of a two-wire debug connection.
///
/// Every call blocks until the transport has completed it. Reads and writes
/// go to whichever address space was last selected with
/// [`set_config`](DebugSession::set_config).
pub trait DebugSession {
    /// Enters debug mode. Must precede every other call.
    fn connect(&mut self) -> Result<()>;

    /// Starts the target clock. Required once per connection before any
    /// flash operation.
    fn clock_init(&mut self) -> Result<()>;

    fn disconnect(&mut self) -> Result<()>;

    fn chip_erase(&mut self) -> Result<()>;

    /// Erases the page containing `address`.
    fn erase_page(&mut self, address: u32) -> Result<()>;

    fn read_code(&mut self, address: u32, len: usize) -> Result<Vec<u8>>;

    /// Writes `data` starting at `address`. No size limit is enforced here,
    /// splitting into device-sized blocks is up to the caller.
    fn write_flash(&mut self, address: u32, data: &[u8]) -> Result<()>;

    /// Selects the address space, see [`AddressSpace`].
    fn set_config(&mut self, selector: u8) -> Result<()>;

    fn get_status(&mut self) -> Result<u8>;

    /// Returns `(chip_id, revision)`.
    fn get_chip_id(&mut self) -> Result<(u8, u8)>;
}

impl<S: DebugSession + ?Sized> DebugSession for Box<S> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn clock_init(&mut self) -> Result<()> {
        (**self).clock_init()
    }

    fn disconnect(&mut self) -> Result<()> {
        (**self).disconnect()
    }

    fn chip_erase(&mut self) -> Result<()> {
        (**self).chip_erase()
    }

    fn erase_page(&mut self, address: u32) -> Result<()> {
        (**self).erase_page(address)
    }

    fn read_code(&mut self, address: u32, len: usize) -> Result<Vec<u8>> {
        (**self).read_code(address, len)
    }

    fn write_flash(&mut self, address: u32, data: &[u8]) -> Result<()> {
        (**self).write_flash(address, data)
    }

    fn set_config(&mut self, selector: u8) -> Result<()> {
        (**self).set_config(selector)
    }

    fn get_status(&mut self) -> Result<u8> {
        (**self).get_status()
    }

    fn get_chip_id(&mut self) -> Result<(u8, u8)> {
        (**self).get_chip_id()
    }
}

/// 同一物理地址范围上的两个逻辑地址空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AddressSpace {
    #[strum(serialize = "code")]
    Code,
    #[strum(serialize = "lock")]
    Lock,
}

impl AddressSpace {
    pub fn selector(self) -> u8 {
        match self {
            AddressSpace::Code => 0,
            AddressSpace::Lock => 1,
        }
    }
}

/// Keeps a non-default address space selected for as long as it lives.
///
/// Creating the guard issues `set_config(space)`. Dropping it issues
/// `set_config(0)` on every path, including early returns with `?`. Use
/// [`release`](AddressSpaceGuard::release) to restore explicitly and see the
/// error of the restoring call.
pub struct AddressSpaceGuard<'a, S: DebugSession + ?Sized> {
    session: &'a mut S,
    space: AddressSpace,
    restored: bool,
}

impl<'a, S: DebugSession + ?Sized> AddressSpaceGuard<'a, S> {
    pub fn acquire(session: &'a mut S, space: AddressSpace) -> Result<Self> {
        tracing::debug!("Selecting {} address space", space);
        let guard = Self {
            session,
            space,
            restored: false,
        };
        // 选择失败时 Drop 仍会尝试切回代码空间
        guard.session.set_config(space.selector())?;
        Ok(guard)
    }

    pub fn space(&self) -> AddressSpace {
        self.space
    }

    pub fn release(mut self) -> Result<()> {
        self.restored = true;
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        tracing::debug!("Restoring code address space");
        self.session.set_config(AddressSpace::Code.selector())
    }
}

impl<S: DebugSession + ?Sized> Deref for AddressSpaceGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.session
    }
}

impl<S: DebugSession + ?Sized> DerefMut for AddressSpaceGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session
    }
}

impl<S: DebugSession + ?Sized> Drop for AddressSpaceGuard<'_, S> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = self.restore() {
            tracing::error!(
                "Failed to restore code address space after {} access: {}",
                self.space,
                e
            );
        }
    }
}
