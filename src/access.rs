use {crate::ConfigError, bitflags::bitflags, std::fs::Metadata};

bitflags! {
    /// Flags which select the properties verified by an [`AccessCheck`].
    ///
    /// [`AccessCheck`]: struct.AccessCheck.html
    pub struct AccessCheckFlags: u32 {
        /// Match the permission bits against the expected mode under the mask.
        const MODE = 0x0001;
        /// Match the owning user id.
        const UID = 0x0002;
        /// Match the owning group id.
        const GID = 0x0004;
    }
}

/// Expected ownership and permissions of a configuration file,
/// verified before the file is parsed.
#[derive(Clone, Copy, Debug)]
pub struct AccessCheck {
    /// Which of the fields below to verify.
    pub flags: AccessCheckFlags,
    /// Expected owning user id.
    pub uid: u32,
    /// Expected owning group id.
    pub gid: u32,
    /// Expected permission bits.
    pub mode: u32,
    /// Mask applied to both sides of the mode comparison.
    /// A mask of zero is widened to all permission bits.
    pub mask: u32,
}

const ALL_PERMISSION_BITS: u32 = 0o777;

impl AccessCheck {
    /// Verifies the file metadata against the expectations.
    #[cfg(unix)]
    pub fn check(&self, metadata: &Metadata) -> Result<(), ConfigError> {
        use std::os::unix::fs::MetadataExt;

        if self.flags.contains(AccessCheckFlags::MODE) {
            let mask = if self.mask == 0 {
                ALL_PERMISSION_BITS
            } else {
                self.mask
            };

            if metadata.mode() & mask != self.mode & mask {
                return Err(ConfigError::AccessCheck("mode"));
            }
        }

        if self.flags.contains(AccessCheckFlags::UID) && metadata.uid() != self.uid {
            return Err(ConfigError::AccessCheck("uid"));
        }

        if self.flags.contains(AccessCheckFlags::GID) && metadata.gid() != self.gid {
            return Err(ConfigError::AccessCheck("gid"));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    pub fn check(&self, _metadata: &Metadata) -> Result<(), ConfigError> {
        if self.flags.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::NotSupported)
        }
    }
}
