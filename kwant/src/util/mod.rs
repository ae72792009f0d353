use std::ffi::{c_char, CStr, CString};
use std::ops::BitOr;

/// Utility functions commonly used
pub mod deletion_stack;
pub use deletion_stack::DeletionStack;
pub mod tests;

/// Thanks phobos
/// https://github.com/NotAPenguin0/phobos-rs/blob/2a1e539611bb3ede5c2d7978300353630c7c553b/src/util/string.rs#L7
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub fn wrap_c_str(c: *const c_char) -> String {
    if c.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(c) }.to_string_lossy().into_owned()
    }
}

/// Converts names into owned C strings, keeping the order
pub fn to_c_strings(names: &[String]) -> crate::Result<Vec<CString>> {
    names
        .iter()
        .map(|name| CString::new(name.as_str()).map_err(crate::KwantError::from))
        .collect()
}

/// ORs `additional` into `current`
pub fn merge_flags<F>(current: F, additional: F) -> F
where
    F: BitOr<Output = F> + Copy,
{
    current | additional
}

#[cfg(test)]
mod test {
    use ash::vk;

    #[test]
    fn merge_flags_accumulates() {
        let flags = super::merge_flags(
            vk::PipelineCreateFlags::DISABLE_OPTIMIZATION,
            vk::PipelineCreateFlags::ALLOW_DERIVATIVES,
        );
        assert!(flags.contains(vk::PipelineCreateFlags::DISABLE_OPTIMIZATION));
        assert!(flags.contains(vk::PipelineCreateFlags::ALLOW_DERIVATIVES));
    }

    #[test]
    fn c_strings_reject_interior_nul() {
        assert!(super::to_c_strings(&["VK_LAYER_ok".to_string()]).is_ok());
        assert_eq!(
            super::to_c_strings(&["bad\0name".to_string()]).unwrap_err(),
            crate::KwantError::StringContainsNull
        );
    }
}
