use ash::vk;
use derivative::Derivative;
#[allow(unused_imports)]
use tracing::trace;

use crate::error::VkResultExt;

/// Represents a [`VkDebugUtilsMessengerEXT`](ash::ext::debug_utils) forwarding validation
/// messages into `tracing`
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DebugMessenger {
	handle: vk::DebugUtilsMessengerEXT,
	#[derivative(Debug = "ignore")]
	ext: ash::ext::debug_utils::Instance,
}

impl DebugMessenger {
	pub fn new(entry: &ash::Entry, instance: &ash::Instance) -> crate::Result<Self> {
		let ext = ash::ext::debug_utils::Instance::new(entry, instance);
		let debug_ci = vk::DebugUtilsMessengerCreateInfoEXT::default()
			.message_severity(
				vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
					| vk::DebugUtilsMessageSeverityFlagsEXT::INFO
					| vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
					| vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
			)
			.message_type(
				vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
					| vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
					| vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
			)
			.pfn_user_callback(Some(vk_debug_callback));
		let handle = unsafe { ext.create_debug_utils_messenger(&debug_ci, None) }
			.native("vkCreateDebugUtilsMessengerEXT")?;

		#[cfg(feature = "log-lifetimes")]
		trace!("Creating VkDebugUtilsMessenger {:p}", handle);

		Ok(Self { handle, ext })
	}

	pub fn destroy(&self) {
		#[cfg(feature = "log-lifetimes")]
		trace!("Destroying VkDebugUtilsMessenger {:p}", self.handle);

		unsafe { self.ext.destroy_debug_utils_messenger(self.handle, None) }
	}
}

/// the callback function used in Debug Utils.
/// thanks phobos https://github.com/NotAPenguin0/phobos-rs/blob/2a1e539611bb3ede5c2d7978300353630c7c553b/src/core/debug.rs#L75-L129
unsafe extern "system" fn vk_debug_callback(
	severity: vk::DebugUtilsMessageSeverityFlagsEXT,
	msg_type: vk::DebugUtilsMessageTypeFlagsEXT,
	p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
	_user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
	if p_callback_data.is_null() {
		return vk::FALSE;
	}
	let callback_data = unsafe { *p_callback_data };
	let message_id_number = callback_data.message_id_number;
	let message_id_name = crate::util::wrap_c_str(callback_data.p_message_id_name);
	let message = crate::util::wrap_c_str(callback_data.p_message);

	match severity {
		vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => {
			tracing::trace!("[{:?}]: {} ({}): {}", msg_type, message_id_name, message_id_number, message);
		}
		vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
			tracing::info!("[{:?}]: {} ({}): {}", msg_type, message_id_name, message_id_number, message);
		}
		vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
			tracing::warn!("[{:?}]: {} ({}): {}", msg_type, message_id_name, message_id_number, message);
		}
		_ => {
			tracing::error!("[{:?}]: {} ({}): {}", msg_type, message_id_name, message_id_number, message);
		}
	};

	vk::FALSE
}
