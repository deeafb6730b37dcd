mod session_payloads;
